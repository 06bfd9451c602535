//! Detector configuration handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::Json;
use nvr_models::{CameraId, DetectorFlags};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Camera id as sent by viewers: a JSON number or a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CameraIdField {
    Number(u32),
    Text(String),
}

impl CameraIdField {
    fn parse(&self) -> ApiResult<CameraId> {
        match self {
            CameraIdField::Number(id) => Ok(CameraId(*id)),
            CameraIdField::Text(raw) => raw
                .parse()
                .map_err(|_| ApiError::bad_request(format!("camera_id '{}' is not a camera id", raw))),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GetConfigQuery {
    pub camera_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub config: String,
}

/// Detector flags of one camera as `"ON, OFF, OFF, ON"` (face, person,
/// vehicle, animal).
pub async fn get_config(
    State(state): State<AppState>,
    Query(query): Query<GetConfigQuery>,
) -> ApiResult<Json<ConfigResponse>> {
    let raw = query
        .camera_id
        .filter(|s| !s.trim().is_empty())
        .ok_or(ApiError::MissingField("camera_id"))?;
    let camera_id = CameraIdField::Text(raw).parse()?;

    let flags = state.coordinator.flags(camera_id)?;
    Ok(Json(ConfigResponse {
        config: flags.to_config_string(),
    }))
}

/// Body of `POST /config`.
///
/// The four viewer flags replace the stored ones and default to off.
/// `explosion_detection` is kept as is when absent.
#[derive(Debug, Deserialize)]
pub struct ConfigUpdateRequest {
    pub camera_id: Option<CameraIdField>,
    #[serde(default)]
    pub face_detection: bool,
    #[serde(default)]
    pub person_detection: bool,
    #[serde(default)]
    pub vehicle_detection: bool,
    #[serde(default)]
    pub animal_detection: bool,
    #[serde(default)]
    pub explosion_detection: Option<bool>,
}

impl ConfigUpdateRequest {
    fn flags(&self, current: DetectorFlags) -> DetectorFlags {
        DetectorFlags {
            face: self.face_detection,
            person: self.person_detection,
            vehicle: self.vehicle_detection,
            animal: self.animal_detection,
            explosion: self.explosion_detection.unwrap_or(current.explosion),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

/// Persist and apply new detector flags for one camera.
pub async fn update_config(
    State(state): State<AppState>,
    payload: Result<Json<ConfigUpdateRequest>, JsonRejection>,
) -> ApiResult<Json<StatusResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let camera_id = request
        .camera_id
        .as_ref()
        .ok_or(ApiError::MissingField("camera_id"))?
        .parse()?;

    // Unknown ids fall through to set_flags, which rejects them.
    let current = state.coordinator.flags(camera_id).unwrap_or_default();
    state
        .coordinator
        .set_flags(camera_id, request.flags(current))
        .await?;
    metrics::record_config_update(camera_id);

    Ok(Json(StatusResponse {
        status: "Configuration updated",
    }))
}
