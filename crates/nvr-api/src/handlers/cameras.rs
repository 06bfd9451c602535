//! Camera listing and motion handlers.

use axum::extract::State;
use axum::Json;
use nvr_models::{CameraId, CameraStatus, MotionStatus};
use serde::Serialize;

use crate::state::AppState;

/// Every configured camera id, ascending.
///
/// Unconnected cameras are listed too; `/cameras/status` tells them apart.
pub async fn list_cameras(State(state): State<AppState>) -> Json<Vec<CameraId>> {
    Json(state.coordinator.camera_ids())
}

/// Status of every configured camera.
pub async fn camera_statuses(State(state): State<AppState>) -> Json<Vec<CameraStatus>> {
    Json(state.coordinator.statuses())
}

/// Last motion result per camera, `{"0": true, "2": false}`.
pub async fn motion_status(State(state): State<AppState>) -> Json<MotionStatus> {
    Json(state.coordinator.motion_status())
}

#[derive(Serialize)]
pub struct ActiveCameraResponse {
    pub camera_id: Option<CameraId>,
}

/// Camera currently receiving the detection passes, if any has shown motion.
pub async fn active_camera(State(state): State<AppState>) -> Json<ActiveCameraResponse> {
    Json(ActiveCameraResponse {
        camera_id: state.coordinator.active_display(),
    })
}
