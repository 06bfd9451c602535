//! Shared data models for the NVR node.
//!
//! This crate provides Serde-serializable types for:
//! - Camera identifiers
//! - Detector kinds and per-camera enable flags
//! - Persisted per-camera settings records
//! - Camera status snapshots exposed over HTTP

pub mod camera;
pub mod detector;
pub mod settings;
pub mod status;

pub use camera::{CameraId, CameraIdParseError};
pub use detector::{DetectorFlags, DetectorKind, DetectorKindParseError};
pub use settings::{CameraSettings, DEFAULT_MOTION_THRESHOLD};
pub use status::{CameraStatus, MotionStatus};
