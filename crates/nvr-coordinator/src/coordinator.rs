//! The capture coordinator.
//!
//! One [`Coordinator`] owns every [`CameraSlot`]. Its [`tick`] pass walks
//! the slots in ascending id order, pulls a frame from each connected
//! camera, runs motion detection, moves the active display selection to
//! the last camera that showed motion, annotates the active camera's frame
//! and hands every frame to its recorder.
//!
//! The selection is sticky: a tick in which no camera reports motion keeps
//! the previous active camera. When several cameras show motion in the same
//! pass the highest id wins because it is processed last.
//!
//! [`tick`]: Coordinator::tick

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use nvr_media::{
    DetectorSet, Frame, FrameSource, MotionDetection, MotionDetector, NullRecorder, Recorder,
};
use nvr_models::{CameraId, CameraSettings, CameraStatus, DetectorFlags, MotionStatus};
use nvr_storage::SettingsRepository;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::error::{CoordinatorError, CoordinatorResult};
use crate::metrics;
use crate::slot::{CameraSlot, SlotPipeline};

/// Default period between reopen attempts for a lost device.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

/// Everything needed to create one slot.
pub struct CameraSetup {
    pub settings: CameraSettings,
    pub source: Box<dyn FrameSource>,
    pub motion: Box<dyn MotionDetection>,
    pub recorder: Box<dyn Recorder>,
}

impl CameraSetup {
    /// Background-subtraction motion at the settings threshold, no recording.
    pub fn new(settings: CameraSettings, source: Box<dyn FrameSource>) -> Self {
        let motion = Box::new(MotionDetector::new(settings.threshold));
        Self {
            settings,
            source,
            motion,
            recorder: Box::new(NullRecorder),
        }
    }

    pub fn with_motion(mut self, motion: Box<dyn MotionDetection>) -> Self {
        self.motion = motion;
        self
    }

    pub fn with_recorder(mut self, recorder: Box<dyn Recorder>) -> Self {
        self.recorder = recorder;
        self
    }
}

/// Builder for [`Coordinator`].
pub struct CoordinatorBuilder {
    store: Arc<dyn SettingsRepository>,
    detectors: Arc<DetectorSet>,
    reconnect_interval: Duration,
    cameras: Vec<CameraSetup>,
}

impl CoordinatorBuilder {
    pub fn detectors(mut self, detectors: Arc<DetectorSet>) -> Self {
        self.detectors = detectors;
        self
    }

    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    pub fn camera(mut self, setup: CameraSetup) -> Self {
        self.cameras.push(setup);
        self
    }

    /// Fails on duplicate camera ids.
    pub fn build(self) -> CoordinatorResult<Coordinator> {
        let mut slots = BTreeMap::new();
        for setup in self.cameras {
            let id = setup.settings.camera_id;
            if slots.contains_key(&id) {
                return Err(CoordinatorError::invalid_argument(format!(
                    "camera {} configured twice",
                    id
                )));
            }
            let slot = CameraSlot::new(
                id,
                setup.settings.threshold,
                setup.settings.flags(),
                setup.source,
                setup.motion,
                setup.recorder,
            );
            metrics::set_camera_connected(id, slot.is_connected());
            slots.insert(id, Arc::new(slot));
        }

        Ok(Coordinator {
            slots,
            active_display: RwLock::new(None),
            detectors: self.detectors,
            store: self.store,
            config_lock: tokio::sync::Mutex::new(()),
            reconnect_interval: self.reconnect_interval,
            last_tick: Mutex::new(None),
        })
    }
}

/// Outcome of one tick pass.
#[derive(Debug, Clone, Default)]
pub struct TickSummary {
    /// Slots that produced a frame.
    pub processed: usize,
    /// Connected slots with no new frame.
    pub idle: usize,
    pub disconnected: usize,
    /// Slots that reported motion, in pass order.
    pub motion: Vec<CameraId>,
    pub active: Option<CameraId>,
    pub duration: Duration,
}

enum SlotOutcome {
    Disconnected,
    NoFrame,
    Processed { motion: bool },
}

/// Owner of all camera slots and the active display selection.
pub struct Coordinator {
    slots: BTreeMap<CameraId, Arc<CameraSlot>>,
    active_display: RwLock<Option<CameraId>>,
    detectors: Arc<DetectorSet>,
    store: Arc<dyn SettingsRepository>,
    /// Serializes persist-then-swap config updates.
    config_lock: tokio::sync::Mutex<()>,
    reconnect_interval: Duration,
    last_tick: Mutex<Option<Instant>>,
}

impl Coordinator {
    pub fn builder(store: Arc<dyn SettingsRepository>) -> CoordinatorBuilder {
        CoordinatorBuilder {
            store,
            detectors: Arc::new(DetectorSet::new()),
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            cameras: Vec::new(),
        }
    }

    /// Configured camera ids in ascending order.
    pub fn camera_ids(&self) -> Vec<CameraId> {
        self.slots.keys().copied().collect()
    }

    pub fn contains(&self, camera_id: CameraId) -> bool {
        self.slots.contains_key(&camera_id)
    }

    pub fn slot(&self, camera_id: CameraId) -> CoordinatorResult<Arc<CameraSlot>> {
        self.slots
            .get(&camera_id)
            .cloned()
            .ok_or(CoordinatorError::NotFound(camera_id))
    }

    pub fn detectors(&self) -> &Arc<DetectorSet> {
        &self.detectors
    }

    pub fn active_display(&self) -> Option<CameraId> {
        *self.active_display.read()
    }

    /// Last motion result of every slot.
    pub fn motion_status(&self) -> MotionStatus {
        self.slots
            .iter()
            .map(|(id, slot)| (*id, slot.motion_detected()))
            .collect()
    }

    pub fn statuses(&self) -> Vec<CameraStatus> {
        let active = self.active_display();
        self.slots
            .values()
            .map(|slot| slot.status(active == Some(slot.id())))
            .collect()
    }

    pub fn flags(&self, camera_id: CameraId) -> CoordinatorResult<DetectorFlags> {
        self.slots
            .get(&camera_id)
            .map(|slot| slot.flags())
            .ok_or(CoordinatorError::NotFound(camera_id))
    }

    /// Persist new detector flags for a camera, then apply them.
    ///
    /// An unknown camera is an invalid argument and changes nothing. When
    /// the store fails the running flags stay as they were.
    pub async fn set_flags(&self, camera_id: CameraId, flags: DetectorFlags) -> CoordinatorResult<()> {
        let slot = self.slots.get(&camera_id).ok_or_else(|| {
            CoordinatorError::invalid_argument(format!("camera {} is not configured", camera_id))
        })?;

        let _guard = self.config_lock.lock().await;
        let settings = CameraSettings::new(camera_id, slot.threshold(), flags);
        self.store.save(&settings).await?;
        slot.set_flags(flags);

        info!(
            camera_id = %camera_id,
            config = %flags.to_config_string(),
            explosion = flags.explosion,
            "Detector configuration updated"
        );
        Ok(())
    }

    /// Copy of `frame` with every enabled detector applied in order.
    /// Failing detectors are logged and skipped.
    pub fn annotate(&self, camera_id: CameraId, frame: &Frame, flags: &DetectorFlags) -> Frame {
        let mut annotated = frame.clone();
        for failure in self.detectors.apply(&mut annotated, flags) {
            warn!(
                camera_id = %camera_id,
                kind = %failure.kind,
                error = %failure.error,
                "Detector failed, passing frame through"
            );
            metrics::record_detector_failure(failure.kind);
        }
        annotated
    }

    /// Time since the last completed tick.
    pub fn last_tick_age(&self) -> Option<Duration> {
        self.last_tick.lock().map(|at| at.elapsed())
    }

    /// One capture, arbitration and record pass over every slot.
    ///
    /// Blocking: runs detectors and recorder writes inline. Must not be
    /// called concurrently with itself.
    pub fn tick(&self) -> TickSummary {
        let started = Instant::now();
        let mut summary = TickSummary::default();

        for slot in self.slots.values() {
            match self.process_slot(slot) {
                SlotOutcome::Disconnected => summary.disconnected += 1,
                SlotOutcome::NoFrame => summary.idle += 1,
                SlotOutcome::Processed { motion } => {
                    summary.processed += 1;
                    if motion {
                        summary.motion.push(slot.id());
                    }
                }
            }
        }

        summary.active = self.active_display();
        summary.duration = started.elapsed();
        *self.last_tick.lock() = Some(Instant::now());
        metrics::record_tick_duration(summary.duration.as_secs_f64());
        summary
    }

    fn process_slot(&self, slot: &CameraSlot) -> SlotOutcome {
        let id = slot.id();
        let mut pipeline = slot.pipeline.lock();
        let (connected, flags) = {
            let state = slot.state.read();
            (state.connected, state.flags)
        };

        if !connected {
            self.try_reconnect(slot, &mut pipeline);
            return SlotOutcome::Disconnected;
        }

        let frame = match pipeline.source.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return SlotOutcome::NoFrame,
            Err(e) => {
                warn!(camera_id = %id, source = %pipeline.source.name(), error = %e, "Camera disconnected");
                let mut state = slot.state.write();
                state.connected = false;
                state.motion_detected = false;
                state.fps = 0.0;
                state.disconnected_since = Some(Instant::now());
                metrics::set_camera_connected(id, false);
                metrics::set_camera_motion(id, false);
                return SlotOutcome::Disconnected;
            }
        };

        let fps = pipeline.fps.record(Instant::now());

        let motion = match pipeline.motion.detect(&frame) {
            Ok(motion) => motion,
            Err(e) => {
                warn!(camera_id = %id, error = %e, "Motion detection failed");
                false
            }
        };

        let is_active = {
            let mut active = self.active_display.write();
            if motion {
                *active = Some(id);
            }
            *active == Some(id)
        };

        let annotated = if is_active && flags.any_enabled() {
            Some(self.annotate(id, &frame, &flags))
        } else {
            None
        };
        let recording = self.record(id, &mut pipeline, annotated.as_ref().unwrap_or(&frame));

        let captured_at = frame.captured_at();
        let rising = {
            let mut state = slot.state.write();
            let rising = motion && !state.motion_detected;
            state.motion_detected = motion;
            if let Some(fps) = fps {
                state.fps = fps;
            }
            state.latest_frame = Some(Arc::new(frame));
            state.frame_seq += 1;
            state.frames_captured += 1;
            state.last_frame_at = Some(captured_at);
            state.recording = recording;
            rising
        };

        metrics::record_frame_captured(id);
        metrics::set_camera_motion(id, motion);
        if let Some(fps) = fps {
            metrics::set_camera_fps(id, fps);
        }
        if rising {
            debug!(camera_id = %id, "Motion started");
            metrics::record_motion_event(id);
        }

        SlotOutcome::Processed { motion }
    }

    /// Write to the slot's recorder; returns whether it is still recording.
    fn record(&self, id: CameraId, pipeline: &mut SlotPipeline, frame: &Frame) -> bool {
        if pipeline.recorder_failed {
            return false;
        }
        if let Err(e) = pipeline.recorder.write(frame) {
            error!(camera_id = %id, error = %e, "Recording failed, stopping recorder");
            metrics::record_recorder_failure(id);
            if let Err(e) = pipeline.recorder.stop() {
                warn!(camera_id = %id, error = %e, "Failed to stop recorder");
            }
            pipeline.recorder_failed = true;
            return false;
        }
        pipeline.recorder.is_recording()
    }

    fn try_reconnect(&self, slot: &CameraSlot, pipeline: &mut SlotPipeline) {
        let id = slot.id();
        if !pipeline.source.is_connected() {
            let now = Instant::now();
            let due = pipeline
                .last_reconnect_attempt
                .map_or(true, |at| now.duration_since(at) >= self.reconnect_interval);
            if !due {
                return;
            }
            pipeline.last_reconnect_attempt = Some(now);
            metrics::record_reconnect_attempt(id);
            if let Err(e) = pipeline.source.reconnect() {
                debug!(camera_id = %id, error = %e, "Reconnect attempt failed");
                return;
            }
            if !pipeline.source.is_connected() {
                return;
            }
        }

        info!(camera_id = %id, source = %pipeline.source.name(), "Camera connected");
        let mut state = slot.state.write();
        state.connected = true;
        state.disconnected_since = None;
        metrics::set_camera_connected(id, true);
    }

    /// Human readable motion summary: one line per camera with motion, or
    /// a single "No motion detected" line.
    pub fn motion_report(&self) -> Vec<String> {
        let lines: Vec<String> = self
            .slots
            .values()
            .filter(|slot| slot.motion_detected())
            .map(|slot| format!("Object detected in cam {}", slot.id()))
            .collect();
        if lines.is_empty() {
            vec!["No motion detected".to_string()]
        } else {
            lines
        }
    }

    /// Stop every recorder and release every device. Blocking.
    pub fn shutdown(&self) {
        for slot in self.slots.values() {
            let mut pipeline = slot.pipeline.lock();
            if let Err(e) = pipeline.recorder.stop() {
                warn!(camera_id = %slot.id(), error = %e, "Failed to finalise recording");
            }
            pipeline.source.close();

            let mut state = slot.state.write();
            state.recording = false;
            state.connected = false;
        }
        info!(cameras = self.slots.len(), "Coordinator shut down");
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("cameras", &self.camera_ids())
            .field("active_display", &self.active_display())
            .field("detectors", &self.detectors)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nvr_media::{
        BoundingBox, Detector, MediaError, MediaResult, MemoryRecorder, ScriptedMotion,
        ScriptedSource,
    };
    use nvr_models::DetectorKind;
    use nvr_storage::MemoryConfigStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Cam {
        source: ScriptedSource,
        motion: ScriptedMotion,
        recorder: MemoryRecorder,
    }

    impl Cam {
        fn frame(&self) {
            self.source.push_filled(16, 12, [20, 20, 20]);
        }
    }

    fn camera(id: u32, flags: DetectorFlags, connected: bool) -> (CameraSetup, Cam) {
        let source = if connected {
            ScriptedSource::new(format!("cam{}", id))
        } else {
            ScriptedSource::disconnected(format!("cam{}", id))
        };
        let cam = Cam {
            source: source.clone(),
            motion: ScriptedMotion::new(),
            recorder: MemoryRecorder::new(),
        };
        let setup = CameraSetup::new(
            CameraSettings::new(CameraId(id), 1000, flags),
            Box::new(source),
        )
        .with_motion(Box::new(cam.motion.clone()))
        .with_recorder(Box::new(cam.recorder.clone()));
        (setup, cam)
    }

    struct CountingDetector {
        kind: DetectorKind,
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl Detector for CountingDetector {
        fn kind(&self) -> DetectorKind {
            self.kind
        }

        fn detect(&self, _frame: &Frame) -> MediaResult<Vec<BoundingBox>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(MediaError::detection_failed("inference error"));
            }
            Ok(vec![BoundingBox::new(0, 0, 4, 4, 0.9)])
        }
    }

    fn face_detector(fail: bool) -> (Arc<DetectorSet>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let set = DetectorSet::new()
            .with(Arc::new(CountingDetector {
                kind: DetectorKind::Face,
                calls: calls.clone(),
                fail,
            }))
            .unwrap();
        (Arc::new(set), calls)
    }

    fn face_on() -> DetectorFlags {
        DetectorFlags {
            face: true,
            ..DetectorFlags::NONE
        }
    }

    #[test]
    fn active_camera_is_sticky() {
        let (s0, c0) = camera(0, DetectorFlags::NONE, true);
        let (s2, c2) = camera(2, DetectorFlags::NONE, true);
        let coord = Coordinator::builder(Arc::new(MemoryConfigStore::new()))
            .camera(s0)
            .camera(s2)
            .build()
            .unwrap();

        assert_eq!(coord.active_display(), None);

        c0.frame();
        c2.frame();
        c0.motion.push(true);
        coord.tick();
        assert_eq!(coord.active_display(), Some(CameraId(0)));

        c0.frame();
        c2.frame();
        let summary = coord.tick();
        assert!(summary.motion.is_empty());
        assert_eq!(coord.active_display(), Some(CameraId(0)));
        assert_eq!(coord.motion_status()[&CameraId(0)], false);
    }

    #[test]
    fn highest_id_wins_when_motion_coincides() {
        let (s0, c0) = camera(0, DetectorFlags::NONE, true);
        let (s3, c3) = camera(3, DetectorFlags::NONE, true);
        let coord = Coordinator::builder(Arc::new(MemoryConfigStore::new()))
            .camera(s3)
            .camera(s0)
            .build()
            .unwrap();

        c0.frame();
        c3.frame();
        c0.motion.push(true);
        c3.motion.push(true);
        let summary = coord.tick();

        assert_eq!(summary.motion, vec![CameraId(0), CameraId(3)]);
        assert_eq!(coord.active_display(), Some(CameraId(3)));
        let active: Vec<_> = coord.statuses().into_iter().filter(|s| s.active).collect();
        assert_eq!(active.len(), 1);
    }

    #[test]
    fn disconnected_slot_has_no_side_effects() {
        let (detectors, calls) = face_detector(false);
        let (s0, c0) = camera(0, face_on(), true);
        let (s2, c2) = camera(2, face_on(), false);
        let coord = Coordinator::builder(Arc::new(MemoryConfigStore::new()))
            .detectors(detectors)
            .reconnect_interval(Duration::from_secs(3600))
            .camera(s0)
            .camera(s2)
            .build()
            .unwrap();

        c0.frame();
        c2.frame();
        c2.motion.push(true);
        let summary = coord.tick();

        assert_eq!(summary.disconnected, 1);
        assert_eq!(c2.source.reads(), 0);
        assert_eq!(c2.source.pending(), 1);
        assert_eq!(c2.recorder.frames_written(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let status = coord.slot(CameraId(2)).unwrap().status(false);
        assert!(!status.connected);
        assert_eq!(status.frames_captured, 0);
        assert_eq!(status.fps, 0.0);
        assert_eq!(coord.motion_status()[&CameraId(2)], false);
        assert_eq!(c0.recorder.frames_written(), 1);
    }

    #[test]
    fn detectors_run_only_on_active_camera() {
        let (detectors, calls) = face_detector(false);
        let (s0, c0) = camera(0, face_on(), true);
        let (s1, c1) = camera(1, face_on(), true);
        let coord = Coordinator::builder(Arc::new(MemoryConfigStore::new()))
            .detectors(detectors)
            .camera(s0)
            .camera(s1)
            .build()
            .unwrap();

        c0.frame();
        c1.frame();
        c0.motion.push(true);
        coord.tick();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(c0.recorder.frames_written(), 1);
        assert_eq!(c1.recorder.frames_written(), 1);

        // Stored frame stays raw; the annotation only went to the recorder.
        let snapshot = coord.slot(CameraId(0)).unwrap().snapshot();
        let frame = snapshot.latest_frame.unwrap();
        assert_eq!(frame.image().get_pixel(0, 0).0, [20, 20, 20]);
    }

    #[test]
    fn detector_failure_does_not_stop_the_pass() {
        let (detectors, calls) = face_detector(true);
        let (s0, c0) = camera(0, face_on(), true);
        let (s1, c1) = camera(1, DetectorFlags::NONE, true);
        let coord = Coordinator::builder(Arc::new(MemoryConfigStore::new()))
            .detectors(detectors)
            .camera(s0)
            .camera(s1)
            .build()
            .unwrap();

        c0.frame();
        c1.frame();
        c0.motion.push(true);
        c1.motion.push_error("bad frame");
        let summary = coord.tick();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(summary.processed, 2);
        assert_eq!(c0.recorder.frames_written(), 1);
        assert_eq!(c1.recorder.frames_written(), 1);
        assert_eq!(coord.active_display(), Some(CameraId(0)));
    }

    #[test]
    fn recorder_failure_stops_only_that_recorder() {
        let (s0, c0) = camera(0, DetectorFlags::NONE, true);
        let (s1, c1) = camera(1, DetectorFlags::NONE, true);
        let coord = Coordinator::builder(Arc::new(MemoryConfigStore::new()))
            .camera(s0)
            .camera(s1)
            .build()
            .unwrap();

        c0.recorder.fail_writes();
        c0.frame();
        c1.frame();
        coord.tick();

        assert!(c0.recorder.is_stopped());
        assert!(!coord.slot(CameraId(0)).unwrap().status(false).recording);
        assert!(coord.slot(CameraId(1)).unwrap().status(false).recording);

        c0.frame();
        c1.frame();
        let summary = coord.tick();
        assert_eq!(summary.processed, 2);
        assert_eq!(c1.recorder.frames_written(), 2);
        assert_eq!(coord.slot(CameraId(0)).unwrap().status(false).frames_captured, 2);
    }

    #[test]
    fn lost_device_is_reopened_at_most_once_per_interval() {
        let (s0, c0) = camera(0, DetectorFlags::NONE, true);
        let coord = Coordinator::builder(Arc::new(MemoryConfigStore::new()))
            .reconnect_interval(Duration::from_secs(3600))
            .camera(s0)
            .build()
            .unwrap();

        c0.source.push_error("unplugged");
        assert_eq!(coord.tick().disconnected, 1);
        assert!(!coord.slot(CameraId(0)).unwrap().is_connected());

        coord.tick();
        coord.tick();
        assert_eq!(c0.source.reconnect_attempts(), 1);

        // Device came back by itself.
        c0.source.set_connected(true);
        c0.frame();
        assert_eq!(coord.tick().disconnected, 1);
        assert!(coord.slot(CameraId(0)).unwrap().is_connected());
        assert_eq!(coord.tick().processed, 1);
    }

    #[test]
    fn idle_source_is_skipped() {
        let (s0, c0) = camera(0, DetectorFlags::NONE, true);
        let coord = Coordinator::builder(Arc::new(MemoryConfigStore::new()))
            .camera(s0)
            .build()
            .unwrap();

        let summary = coord.tick();
        assert_eq!(summary.idle, 1);
        assert_eq!(c0.recorder.frames_written(), 0);
        assert!(coord.last_tick_age().is_some());
    }

    #[tokio::test]
    async fn set_flags_persists_then_applies() {
        let store = Arc::new(MemoryConfigStore::new());
        let (s0, _c0) = camera(0, DetectorFlags::NONE, true);
        let coord = Coordinator::builder(store.clone())
            .camera(s0)
            .build()
            .unwrap();

        coord.set_flags(CameraId(0), face_on()).await.unwrap();

        assert_eq!(coord.flags(CameraId(0)).unwrap(), face_on());
        assert_eq!(coord.flags(CameraId(0)).unwrap().to_config_string(), "ON, OFF, OFF, OFF");
        let saved = store.get(CameraId(0)).unwrap();
        assert_eq!(saved.flags(), face_on());
        assert_eq!(saved.threshold, 1000);
    }

    #[tokio::test]
    async fn set_flags_for_unknown_camera_changes_nothing() {
        let store = Arc::new(MemoryConfigStore::new());
        let (s0, _c0) = camera(0, DetectorFlags::NONE, true);
        let coord = Coordinator::builder(store.clone())
            .camera(s0)
            .build()
            .unwrap();

        let err = coord.set_flags(CameraId(9), face_on()).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::InvalidArgument(_)));
        assert!(store.get(CameraId(9)).is_none());
        assert_eq!(coord.flags(CameraId(0)).unwrap(), DetectorFlags::NONE);
        assert!(matches!(
            coord.flags(CameraId(9)),
            Err(CoordinatorError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn failed_save_keeps_running_flags() {
        let store = Arc::new(MemoryConfigStore::new());
        let (s0, _c0) = camera(0, DetectorFlags::NONE, true);
        let coord = Coordinator::builder(store.clone())
            .camera(s0)
            .build()
            .unwrap();

        store.fail_saves(true);
        let err = coord.set_flags(CameraId(0), face_on()).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::Storage(_)));
        assert_eq!(coord.flags(CameraId(0)).unwrap(), DetectorFlags::NONE);
    }

    #[test]
    fn motion_report_lists_cameras_with_motion() {
        let (s0, c0) = camera(0, DetectorFlags::NONE, true);
        let (s4, c4) = camera(4, DetectorFlags::NONE, true);
        let coord = Coordinator::builder(Arc::new(MemoryConfigStore::new()))
            .camera(s0)
            .camera(s4)
            .build()
            .unwrap();

        assert_eq!(coord.motion_report(), vec!["No motion detected"]);

        c0.frame();
        c4.frame();
        c4.motion.push(true);
        coord.tick();
        assert_eq!(coord.motion_report(), vec!["Object detected in cam 4"]);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let (a, _) = camera(1, DetectorFlags::NONE, true);
        let (b, _) = camera(1, DetectorFlags::NONE, true);
        let result = Coordinator::builder(Arc::new(MemoryConfigStore::new()))
            .camera(a)
            .camera(b)
            .build();
        assert!(matches!(result, Err(CoordinatorError::InvalidArgument(_))));
    }

    #[test]
    fn shutdown_stops_recorders() {
        let (s0, c0) = camera(0, DetectorFlags::NONE, true);
        let coord = Coordinator::builder(Arc::new(MemoryConfigStore::new()))
            .camera(s0)
            .build()
            .unwrap();

        coord.shutdown();
        assert!(c0.recorder.is_stopped());
        assert!(c0.source.is_closed());
        assert!(!coord.slot(CameraId(0)).unwrap().is_connected());
    }
}
