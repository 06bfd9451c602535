//! Annotating detectors.
//!
//! A [`Detector`] finds boxes of one [`DetectorKind`] and draws them onto the
//! frame. [`DetectorSet`] holds at most one detector per kind and applies the
//! enabled ones in the fixed annotation order, each working on the output of
//! the previous one.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use nvr_models::{DetectorFlags, DetectorKind};
use tracing::debug;

use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;

#[cfg(feature = "onnx")]
pub mod object_detector;

#[cfg(feature = "onnx")]
pub use object_detector::{ClassFilter, ObjectDetector, ObjectDetectorConfig};

/// Box in source pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub confidence: f32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32, confidence: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence,
        }
    }

    /// Clip to the image; `None` when nothing is left.
    pub fn clipped(&self, image_width: u32, image_height: u32) -> Option<Self> {
        if self.x >= image_width || self.y >= image_height {
            return None;
        }
        let width = self.width.min(image_width - self.x);
        let height = self.height.min(image_height - self.y);
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self {
            width,
            height,
            ..*self
        })
    }
}

/// Box colour per detector kind.
pub fn box_color(kind: DetectorKind) -> Rgb<u8> {
    match kind {
        DetectorKind::Motion => Rgb([255, 255, 255]),
        DetectorKind::Face => Rgb([255, 0, 0]),
        DetectorKind::Person => Rgb([0, 255, 0]),
        DetectorKind::Vehicle => Rgb([0, 0, 255]),
        DetectorKind::Animal => Rgb([255, 255, 0]),
        DetectorKind::Explosion => Rgb([255, 128, 0]),
    }
}

/// Draw 2px hollow boxes.
pub fn draw_boxes(image: &mut RgbImage, boxes: &[BoundingBox], color: Rgb<u8>) {
    let (w, h) = image.dimensions();
    for bbox in boxes.iter().filter_map(|b| b.clipped(w, h)) {
        let outer = Rect::at(bbox.x as i32, bbox.y as i32).of_size(bbox.width, bbox.height);
        draw_hollow_rect_mut(image, outer, color);
        if bbox.width > 2 && bbox.height > 2 {
            let inner = Rect::at(bbox.x as i32 + 1, bbox.y as i32 + 1)
                .of_size(bbox.width - 2, bbox.height - 2);
            draw_hollow_rect_mut(image, inner, color);
        }
    }
}

/// Frame annotation pass for one detector kind.
pub trait Detector: Send + Sync {
    fn kind(&self) -> DetectorKind;

    /// Run inference without touching the frame.
    fn detect(&self, frame: &Frame) -> MediaResult<Vec<BoundingBox>>;

    /// Detect, then draw. The frame is only modified after inference
    /// succeeded.
    fn annotate(&self, frame: &mut Frame) -> MediaResult<()> {
        let boxes = self.detect(frame)?;
        if !boxes.is_empty() {
            debug!(kind = %self.kind(), count = boxes.len(), "Annotating frame");
            draw_boxes(frame.image_mut(), &boxes, box_color(self.kind()));
        }
        Ok(())
    }
}

/// A detector that failed during [`DetectorSet::apply`].
#[derive(Debug)]
pub struct AnnotationFailure {
    pub kind: DetectorKind,
    pub error: MediaError,
}

impl fmt::Display for AnnotationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} detector failed: {}", self.kind, self.error)
    }
}

/// Detectors shared by every camera, keyed by kind.
#[derive(Clone, Default)]
pub struct DetectorSet {
    detectors: BTreeMap<DetectorKind, Arc<dyn Detector>>,
}

impl DetectorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a detector, replacing any previous one of the same kind.
    /// Motion detectors are per camera and are not accepted here.
    pub fn insert(&mut self, detector: Arc<dyn Detector>) -> MediaResult<()> {
        let kind = detector.kind();
        if !kind.is_annotation() {
            return Err(MediaError::internal(format!(
                "{} is not an annotation detector",
                kind
            )));
        }
        self.detectors.insert(kind, detector);
        Ok(())
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, detector: Arc<dyn Detector>) -> MediaResult<Self> {
        self.insert(detector)?;
        Ok(self)
    }

    pub fn contains(&self, kind: DetectorKind) -> bool {
        self.detectors.contains_key(&kind)
    }

    pub fn kinds(&self) -> Vec<DetectorKind> {
        self.detectors.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// Apply every enabled detector in annotation order.
    ///
    /// Kinds without a registered detector are skipped. A failing detector
    /// leaves the frame as the previous pass produced it and the next one
    /// continues; failures are returned for the caller to log.
    pub fn apply(&self, frame: &mut Frame, flags: &DetectorFlags) -> Vec<AnnotationFailure> {
        let mut failures = Vec::new();
        for kind in flags.enabled_in_order() {
            let Some(detector) = self.detectors.get(&kind) else {
                continue;
            };
            if let Err(error) = detector.annotate(frame) {
                failures.push(AnnotationFailure { kind, error });
            }
        }
        failures
    }
}

impl fmt::Debug for DetectorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectorSet")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Records the call order and boxes the top-left corner.
    struct Recording {
        kind: DetectorKind,
        calls: Arc<Mutex<Vec<DetectorKind>>>,
        fail: bool,
    }

    impl Detector for Recording {
        fn kind(&self) -> DetectorKind {
            self.kind
        }

        fn detect(&self, _frame: &Frame) -> MediaResult<Vec<BoundingBox>> {
            self.calls.lock().push(self.kind);
            if self.fail {
                return Err(MediaError::detection_failed("model crashed"));
            }
            Ok(vec![BoundingBox::new(0, 0, 4, 4, 0.9)])
        }
    }

    fn set_with(
        kinds: &[(DetectorKind, bool)],
        calls: &Arc<Mutex<Vec<DetectorKind>>>,
    ) -> DetectorSet {
        let mut set = DetectorSet::new();
        for (kind, fail) in kinds {
            set.insert(Arc::new(Recording {
                kind: *kind,
                calls: calls.clone(),
                fail: *fail,
            }))
            .unwrap();
        }
        set
    }

    #[test]
    fn applies_enabled_detectors_in_fixed_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let set = set_with(
            &[
                (DetectorKind::Explosion, false),
                (DetectorKind::Animal, false),
                (DetectorKind::Face, false),
                (DetectorKind::Person, false),
            ],
            &calls,
        );
        let flags = DetectorFlags {
            face: true,
            person: false,
            vehicle: true,
            animal: true,
            explosion: true,
        };

        let mut frame = Frame::filled(8, 8, [0, 0, 0], 0);
        let failures = set.apply(&mut frame, &flags);

        assert!(failures.is_empty());
        // Vehicle has no detector and is skipped; person is disabled.
        assert_eq!(
            *calls.lock(),
            vec![
                DetectorKind::Face,
                DetectorKind::Animal,
                DetectorKind::Explosion
            ]
        );
        // Last pass wins on the shared corner.
        assert_eq!(
            *frame.image().get_pixel(0, 0),
            box_color(DetectorKind::Explosion)
        );
    }

    #[test]
    fn failing_detector_passes_frame_through() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let set = set_with(
            &[(DetectorKind::Face, true), (DetectorKind::Person, false)],
            &calls,
        );
        let flags = DetectorFlags {
            face: true,
            person: true,
            ..DetectorFlags::NONE
        };

        let mut frame = Frame::filled(8, 8, [0, 0, 0], 0);
        let failures = set.apply(&mut frame, &flags);

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, DetectorKind::Face);
        assert_eq!(calls.lock().len(), 2);
        assert_eq!(
            *frame.image().get_pixel(0, 0),
            box_color(DetectorKind::Person)
        );
    }

    #[test]
    fn disabled_flags_leave_frame_untouched() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let set = set_with(&[(DetectorKind::Face, false)], &calls);

        let mut frame = Frame::filled(8, 8, [9, 9, 9], 0);
        assert!(set.apply(&mut frame, &DetectorFlags::NONE).is_empty());
        assert!(calls.lock().is_empty());
        assert_eq!(frame.image().get_pixel(0, 0).0, [9, 9, 9]);
    }

    #[test]
    fn rejects_motion_detectors() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut set = DetectorSet::new();
        let result = set.insert(Arc::new(Recording {
            kind: DetectorKind::Motion,
            calls,
            fail: false,
        }));
        assert!(result.is_err());
        assert!(set.is_empty());
    }

    #[test]
    fn boxes_are_clipped_to_image() {
        let bbox = BoundingBox::new(6, 6, 10, 10, 0.5);
        let clipped = bbox.clipped(8, 8).unwrap();
        assert_eq!((clipped.width, clipped.height), (2, 2));
        assert!(BoundingBox::new(8, 0, 4, 4, 0.5).clipped(8, 8).is_none());

        let mut img = RgbImage::new(8, 8);
        draw_boxes(&mut img, &[bbox], Rgb([1, 2, 3]));
        assert_eq!(img.get_pixel(7, 7).0, [1, 2, 3]);
    }
}
