//! Frame capture, detection, recording and encoding.
//!
//! This crate provides:
//! - `Frame`, the unit passed between capture, detection and output
//! - `FrameSource` implementations (ffmpeg device capture, test pattern, scripted mock)
//! - Background-subtraction motion detection
//! - The `Detector` trait and `DetectorSet` for ordered annotation passes
//! - ONNX object detectors (with the `onnx` feature)
//! - `Recorder` implementations writing continuous video files
//! - JPEG encoding for live streams

pub mod command;
pub mod detection;
pub mod encode;
pub mod error;
pub mod frame;
pub mod motion;
pub mod recorder;
pub mod source;

pub use command::{find_ffmpeg, FfmpegCommand};
pub use detection::{AnnotationFailure, BoundingBox, Detector, DetectorSet};
pub use encode::{encode_jpeg, DEFAULT_JPEG_QUALITY};
pub use error::{MediaError, MediaResult};
pub use frame::Frame;
pub use motion::{MotionDetection, MotionDetector, ScriptedMotion};
pub use recorder::{FfmpegRecorder, MemoryRecorder, NullRecorder, Recorder};
pub use source::{
    available_devices, CaptureConfig, FfmpegCapture, FrameSource, ScriptedSource,
    TestPatternSource,
};

#[cfg(feature = "onnx")]
pub use detection::{ClassFilter, ObjectDetector, ObjectDetectorConfig};
