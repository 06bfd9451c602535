//! Per-camera state.
//!
//! A [`CameraSlot`] splits its data in two:
//!
//! - [`SlotState`] is what HTTP handlers read. It sits behind a read/write
//!   lock and the tick replaces its fields as a group, so a reader never
//!   sees values from two different ticks.
//! - The pipeline (source, motion detector, recorder, FPS counter) is only
//!   touched by the tick and by shutdown.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use nvr_media::{Frame, FrameSource, MotionDetection, Recorder};
use nvr_models::{CameraId, CameraStatus, DetectorFlags};
use parking_lot::{Mutex, RwLock};

/// Frames-per-second over wall-clock windows of at least one second.
#[derive(Debug, Clone)]
pub struct FpsCounter {
    frame_count: u32,
    window_start: Instant,
    fps: f64,
}

impl FpsCounter {
    const WINDOW: Duration = Duration::from_secs(1);

    pub fn new(now: Instant) -> Self {
        Self {
            frame_count: 0,
            window_start: now,
            fps: 0.0,
        }
    }

    /// Count one frame. Returns the new rate when a window closed.
    pub fn record(&mut self, now: Instant) -> Option<f64> {
        self.frame_count += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < Self::WINDOW {
            return None;
        }
        self.fps = self.frame_count as f64 / elapsed.as_secs_f64();
        self.frame_count = 0;
        self.window_start = now;
        Some(self.fps)
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }
}

/// Reader-visible state of one slot.
///
/// Cloning is cheap; the frame is shared.
#[derive(Debug, Clone)]
pub struct SlotState {
    pub connected: bool,
    pub flags: DetectorFlags,
    pub motion_detected: bool,
    pub fps: f64,
    /// Latest raw (unannotated) frame.
    pub latest_frame: Option<Arc<Frame>>,
    /// Bumped every time `latest_frame` is replaced.
    pub frame_seq: u64,
    pub recording: bool,
    pub frames_captured: u64,
    pub last_frame_at: Option<DateTime<Utc>>,
    /// When the slot last went from connected to disconnected.
    pub disconnected_since: Option<Instant>,
}

impl SlotState {
    fn new(connected: bool, flags: DetectorFlags, now: Instant) -> Self {
        Self {
            connected,
            flags,
            motion_detected: false,
            fps: 0.0,
            latest_frame: None,
            frame_seq: 0,
            recording: false,
            frames_captured: 0,
            last_frame_at: None,
            disconnected_since: if connected { None } else { Some(now) },
        }
    }
}

pub(crate) struct SlotPipeline {
    pub(crate) source: Box<dyn FrameSource>,
    pub(crate) motion: Box<dyn MotionDetection>,
    pub(crate) recorder: Box<dyn Recorder>,
    pub(crate) recorder_failed: bool,
    pub(crate) fps: FpsCounter,
    pub(crate) last_reconnect_attempt: Option<Instant>,
}

/// One configured camera.
pub struct CameraSlot {
    id: CameraId,
    threshold: u32,
    pub(crate) state: RwLock<SlotState>,
    pub(crate) pipeline: Mutex<SlotPipeline>,
}

impl CameraSlot {
    pub(crate) fn new(
        id: CameraId,
        threshold: u32,
        flags: DetectorFlags,
        source: Box<dyn FrameSource>,
        motion: Box<dyn MotionDetection>,
        recorder: Box<dyn Recorder>,
    ) -> Self {
        let now = Instant::now();
        let connected = source.is_connected();
        Self {
            id,
            threshold,
            state: RwLock::new(SlotState::new(connected, flags, now)),
            pipeline: Mutex::new(SlotPipeline {
                source,
                motion,
                recorder,
                recorder_failed: false,
                fps: FpsCounter::new(now),
                last_reconnect_attempt: None,
            }),
        }
    }

    pub fn id(&self) -> CameraId {
        self.id
    }

    /// Motion threshold loaded from settings.
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Consistent copy of the reader-visible state.
    pub fn snapshot(&self) -> SlotState {
        self.state.read().clone()
    }

    pub fn flags(&self) -> DetectorFlags {
        self.state.read().flags
    }

    pub fn is_connected(&self) -> bool {
        self.state.read().connected
    }

    pub fn motion_detected(&self) -> bool {
        self.state.read().motion_detected
    }

    pub(crate) fn set_flags(&self, flags: DetectorFlags) {
        self.state.write().flags = flags;
    }

    pub fn status(&self, active: bool) -> CameraStatus {
        let state = self.state.read();
        CameraStatus {
            camera_id: self.id,
            connected: state.connected,
            motion_detected: state.motion_detected,
            fps: state.fps,
            recording: state.recording,
            active,
            frames_captured: state.frames_captured,
            last_frame_at: state.last_frame_at,
        }
    }
}

impl std::fmt::Debug for CameraSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSlot")
            .field("id", &self.id)
            .field("threshold", &self.threshold)
            .field("state", &*self.state.read())
            .finish()
    }
}
