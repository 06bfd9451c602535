//! Object detection using YOLOv8-format ONNX models.
//!
//! One [`ObjectDetector`] serves one [`DetectorKind`]. The person, vehicle
//! and animal passes can share a COCO model with different class filters;
//! face and explosion passes use dedicated single-class models.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use ndarray::Array;
use nvr_models::DetectorKind;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use parking_lot::Mutex;
use tracing::{debug, info};

use super::{BoundingBox, Detector};
use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;

/// Raw detection in normalized coordinates [0, 1].
#[derive(Debug, Clone)]
struct Candidate {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    class_id: usize,
    confidence: f32,
}

/// Class ids a detector keeps from the model output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassFilter(Vec<usize>);

impl ClassFilter {
    pub fn new(classes: impl IntoIterator<Item = usize>) -> Self {
        Self(classes.into_iter().collect())
    }

    /// Default classes for each kind: COCO ids for person, vehicle and
    /// animal, class 0 of a dedicated model for face and explosion.
    pub fn for_kind(kind: DetectorKind) -> Self {
        match kind {
            DetectorKind::Person => Self::new([0]),
            // car, motorcycle, bus, truck
            DetectorKind::Vehicle => Self::new([2, 3, 5, 7]),
            // bird through giraffe
            DetectorKind::Animal => Self::new(14..=23),
            DetectorKind::Face | DetectorKind::Explosion | DetectorKind::Motion => Self::new([0]),
        }
    }

    pub fn accepts(&self, class_id: usize) -> bool {
        self.0.contains(&class_id)
    }
}

/// Configuration for one object detector.
#[derive(Debug, Clone)]
pub struct ObjectDetectorConfig {
    pub kind: DetectorKind,
    /// Path to ONNX model file
    pub model_path: PathBuf,
    pub classes: ClassFilter,
    /// Confidence threshold for detections
    pub confidence_threshold: f32,
    /// IoU threshold for NMS
    pub nms_threshold: f32,
    /// Input image size (model expects square input)
    pub input_size: u32,
    /// Name of the output tensor
    pub output_name: String,
}

impl ObjectDetectorConfig {
    pub fn new(kind: DetectorKind, model_path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            model_path: model_path.into(),
            classes: ClassFilter::for_kind(kind),
            confidence_threshold: 0.5,
            nms_threshold: 0.45,
            input_size: 640,
            output_name: "output0".to_string(),
        }
    }
}

/// YOLOv8 ONNX detector for one annotation kind.
pub struct ObjectDetector {
    session: Mutex<Session>,
    config: ObjectDetectorConfig,
}

impl ObjectDetector {
    /// Load the model. Fails if the file is missing or cannot be parsed.
    pub fn new(config: ObjectDetectorConfig) -> MediaResult<Self> {
        if !config.model_path.exists() {
            return Err(MediaError::model_not_found(
                config.model_path.display().to_string(),
            ));
        }

        let session = Mutex::new(create_session(&config.model_path)?);
        info!(
            kind = %config.kind,
            model_path = %config.model_path.display(),
            input_size = config.input_size,
            "Object detector initialized"
        );

        Ok(Self { session, config })
    }

    pub fn config(&self) -> &ObjectDetectorConfig {
        &self.config
    }

    /// Resize to the model input, normalize to [0, 1], NCHW layout.
    fn preprocess(&self, frame: &Frame) -> MediaResult<Value> {
        let size = self.config.input_size;
        let resized = image::imageops::resize(frame.image(), size, size, FilterType::Triangle);
        let (w, h) = (size as usize, size as usize);

        let mut chw_data: Vec<f32> = Vec::with_capacity(3 * h * w);
        for c in 0..3 {
            for y in 0..h {
                for x in 0..w {
                    let pixel = resized.get_pixel(x as u32, y as u32);
                    chw_data.push(pixel[c] as f32 / 255.0);
                }
            }
        }

        let shape = vec![1usize, 3, h, w];
        Tensor::from_array((shape, chw_data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| MediaError::detection_failed(format!("Failed to create tensor: {}", e)))
    }

    /// Returns the output shape and data.
    fn run_inference(&self, input: Value) -> MediaResult<(Vec<i64>, Vec<f32>)> {
        let mut session = self.session.lock();

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| MediaError::detection_failed(format!("ONNX inference failed: {}", e)))?;

        let output = outputs.get(self.config.output_name.as_str()).ok_or_else(|| {
            MediaError::detection_failed(format!("Missing {} tensor", self.config.output_name))
        })?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| MediaError::detection_failed(format!("Failed to extract tensor: {}", e)))?;

        Ok((shape.iter().copied().collect(), data.to_vec()))
    }

    /// Parse `[1, 4 + classes, boxes]` output and apply NMS.
    fn postprocess(&self, shape: &[i64], outputs: Vec<f32>) -> MediaResult<Vec<Candidate>> {
        let (num_features, num_boxes) = match shape {
            [1, features, boxes] if *features > 4 && *boxes > 0 => {
                (*features as usize, *boxes as usize)
            }
            _ => {
                return Err(MediaError::detection_failed(format!(
                    "Unexpected output shape: {:?}",
                    shape
                )))
            }
        };
        let num_classes = num_features - 4;

        let output_array = Array::from_shape_vec((num_features, num_boxes), outputs)
            .map_err(|e| MediaError::detection_failed(format!("Failed to reshape output: {}", e)))?;
        let transposed = output_array.t();

        let input_size = self.config.input_size as f32;
        let mut candidates = Vec::new();

        for i in 0..num_boxes {
            let mut best_class = 0;
            let mut best_score = 0.0f32;
            for c in 0..num_classes {
                let score = transposed[[i, 4 + c]];
                if score > best_score {
                    best_score = score;
                    best_class = c;
                }
            }

            if best_score < self.config.confidence_threshold
                || !self.config.classes.accepts(best_class)
            {
                continue;
            }

            let cx = transposed[[i, 0]] / input_size;
            let cy = transposed[[i, 1]] / input_size;
            let w = transposed[[i, 2]] / input_size;
            let h = transposed[[i, 3]] / input_size;

            let x = (cx - w / 2.0).clamp(0.0, 1.0);
            let y = (cy - h / 2.0).clamp(0.0, 1.0);

            candidates.push(Candidate {
                x,
                y,
                width: w.min(1.0 - x),
                height: h.min(1.0 - y),
                class_id: best_class,
                confidence: best_score,
            });
        }

        Ok(non_maximum_suppression(candidates, self.config.nms_threshold))
    }
}

impl Detector for ObjectDetector {
    fn kind(&self) -> DetectorKind {
        self.config.kind
    }

    fn detect(&self, frame: &Frame) -> MediaResult<Vec<BoundingBox>> {
        let (width, height) = frame.dimensions();
        let input = self.preprocess(frame)?;
        let (shape, data) = self.run_inference(input)?;
        let candidates = self.postprocess(&shape, data)?;

        debug!(kind = %self.config.kind, count = candidates.len(), "Object detection completed");

        Ok(candidates
            .into_iter()
            .map(|c| to_pixels(&c, width, height))
            .collect())
    }
}

fn to_pixels(candidate: &Candidate, width: u32, height: u32) -> BoundingBox {
    let (w, h) = (width as f32, height as f32);
    BoundingBox::new(
        (candidate.x * w) as u32,
        (candidate.y * h) as u32,
        (candidate.width * w).round() as u32,
        (candidate.height * h).round() as u32,
        candidate.confidence,
    )
}

/// Keep the most confident box of each overlapping same-class group.
fn non_maximum_suppression(mut detections: Vec<Candidate>, threshold: f32) -> Vec<Candidate> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<Candidate> = Vec::new();
    for candidate in detections {
        let overlaps = keep.iter().any(|kept| {
            kept.class_id == candidate.class_id && compute_iou(kept, &candidate) > threshold
        });
        if !overlaps {
            keep.push(candidate);
        }
    }
    keep
}

fn compute_iou(a: &Candidate, b: &Candidate) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.width * a.height + b.width * b.height - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

fn create_session(model_path: &Path) -> MediaResult<Session> {
    let model_bytes = std::fs::read(model_path)?;

    let builder = Session::builder()
        .map_err(|e| MediaError::internal(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| MediaError::internal(format!("Failed to set optimization level: {}", e)))?;

    #[cfg(target_os = "macos")]
    {
        use ort::execution_providers::CoreMLExecutionProvider;
        if let Ok(coreml_builder) = builder
            .clone()
            .with_execution_providers([CoreMLExecutionProvider::default().build()])
        {
            if let Ok(session) = coreml_builder.commit_from_memory(&model_bytes) {
                info!("Using CoreML execution provider for object detection");
                return Ok(session);
            }
        }
        debug!("CoreML execution provider not available, using CPU");
    }

    builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| MediaError::internal(format!("Failed to load ONNX model: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(x: f32, class_id: usize, confidence: f32) -> Candidate {
        Candidate {
            x,
            y: 0.1,
            width: 0.2,
            height: 0.2,
            class_id,
            confidence,
        }
    }

    #[test]
    fn class_filters_per_kind() {
        assert!(ClassFilter::for_kind(DetectorKind::Person).accepts(0));
        assert!(!ClassFilter::for_kind(DetectorKind::Person).accepts(2));
        let vehicles = ClassFilter::for_kind(DetectorKind::Vehicle);
        assert!([2, 3, 5, 7].iter().all(|c| vehicles.accepts(*c)));
        assert!(!vehicles.accepts(4));
        let animals = ClassFilter::for_kind(DetectorKind::Animal);
        assert!(animals.accepts(14) && animals.accepts(23));
        assert!(!animals.accepts(24));
    }

    #[test]
    fn nms_suppresses_same_class_overlap_only() {
        let kept = non_maximum_suppression(
            vec![
                candidate(0.10, 0, 0.6),
                candidate(0.11, 0, 0.9),
                candidate(0.11, 2, 0.7),
                candidate(0.70, 0, 0.5),
            ],
            0.45,
        );
        assert_eq!(kept.len(), 3);
        assert!((kept[0].confidence - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = candidate(0.1, 0, 0.9);
        assert!((compute_iou(&a, &a) - 1.0).abs() < 0.001);
        assert_eq!(compute_iou(&a, &candidate(0.8, 0, 0.9)), 0.0);
    }

    #[test]
    fn missing_model_is_reported() {
        let config = ObjectDetectorConfig::new(DetectorKind::Face, "/nonexistent/face.onnx");
        assert!(matches!(
            ObjectDetector::new(config),
            Err(MediaError::ModelNotFound(_))
        ));
    }

    #[test]
    fn normalized_boxes_scale_to_pixels() {
        let bbox = to_pixels(&candidate(0.5, 0, 0.8), 640, 480);
        assert_eq!((bbox.x, bbox.y, bbox.width, bbox.height), (320, 48, 128, 96));
    }
}
