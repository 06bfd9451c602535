//! Coordinator metrics.

use metrics::{counter, gauge, histogram};
use nvr_models::{CameraId, DetectorKind};

/// Metric names as constants for consistency.
pub mod names {
    pub const TICK_DURATION_SECONDS: &str = "nvr_tick_duration_seconds";
    pub const FRAMES_CAPTURED_TOTAL: &str = "nvr_frames_captured_total";
    pub const MOTION_EVENTS_TOTAL: &str = "nvr_motion_events_total";
    pub const DETECTOR_FAILURES_TOTAL: &str = "nvr_detector_failures_total";
    pub const RECORDER_FAILURES_TOTAL: &str = "nvr_recorder_failures_total";
    pub const CAMERA_CONNECTED: &str = "nvr_camera_connected";
    pub const CAMERA_MOTION: &str = "nvr_camera_motion";
    pub const CAMERA_FPS: &str = "nvr_camera_fps";
    pub const RECONNECT_ATTEMPTS_TOTAL: &str = "nvr_reconnect_attempts_total";
}

fn camera_label(camera_id: CameraId) -> [(&'static str, String); 1] {
    [("camera", camera_id.to_string())]
}

pub fn record_tick_duration(duration_secs: f64) {
    histogram!(names::TICK_DURATION_SECONDS).record(duration_secs);
}

pub fn record_frame_captured(camera_id: CameraId) {
    counter!(names::FRAMES_CAPTURED_TOTAL, &camera_label(camera_id)).increment(1);
}

/// Motion started on a camera (rising edge only).
pub fn record_motion_event(camera_id: CameraId) {
    counter!(names::MOTION_EVENTS_TOTAL, &camera_label(camera_id)).increment(1);
}

pub fn record_detector_failure(kind: DetectorKind) {
    let labels = [("kind", kind.to_string())];
    counter!(names::DETECTOR_FAILURES_TOTAL, &labels).increment(1);
}

pub fn record_recorder_failure(camera_id: CameraId) {
    counter!(names::RECORDER_FAILURES_TOTAL, &camera_label(camera_id)).increment(1);
}

pub fn record_reconnect_attempt(camera_id: CameraId) {
    counter!(names::RECONNECT_ATTEMPTS_TOTAL, &camera_label(camera_id)).increment(1);
}

pub fn set_camera_connected(camera_id: CameraId, connected: bool) {
    gauge!(names::CAMERA_CONNECTED, &camera_label(camera_id)).set(if connected { 1.0 } else { 0.0 });
}

pub fn set_camera_motion(camera_id: CameraId, motion: bool) {
    gauge!(names::CAMERA_MOTION, &camera_label(camera_id)).set(if motion { 1.0 } else { 0.0 });
}

pub fn set_camera_fps(camera_id: CameraId, fps: f64) {
    gauge!(names::CAMERA_FPS, &camera_label(camera_id)).set(fps);
}
