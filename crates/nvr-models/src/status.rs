//! Camera status snapshots.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::camera::CameraId;

/// Last motion result per camera, keyed by id.
pub type MotionStatus = BTreeMap<CameraId, bool>;

/// Point-in-time view of one camera slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraStatus {
    pub camera_id: CameraId,
    pub connected: bool,
    pub motion_detected: bool,
    /// Frames per second over the last completed one-second window.
    pub fps: f64,
    pub recording: bool,
    /// True when this camera is the active display camera.
    pub active: bool,
    pub frames_captured: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_frame_at: Option<DateTime<Utc>>,
}
