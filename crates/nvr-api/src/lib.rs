//! HTTP surface of the NVR node.
//!
//! This crate provides:
//! - Camera listing, motion status and MJPEG live streams
//! - Per-camera detector configuration
//! - Health, readiness and Prometheus metrics endpoints
//! - Node configuration from the environment

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::{CaptureBackend, ConfigError, NodeConfig};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
