//! Camera coordination for the NVR node.
//!
//! This crate provides:
//! - `CameraSlot`, the per-camera unit of state
//! - `Coordinator`, which runs the capture tick, picks the active display
//!   camera and serves consistent snapshots to concurrent readers
//! - `TickDriver` and `MotionReporter`, the background loops
//! - Coordinator metrics

pub mod coordinator;
pub mod driver;
pub mod error;
pub mod metrics;
pub mod slot;

pub use coordinator::{
    CameraSetup, Coordinator, CoordinatorBuilder, TickSummary, DEFAULT_RECONNECT_INTERVAL,
};
pub use driver::{MotionReporter, TickDriver};
pub use error::{CoordinatorError, CoordinatorResult};
pub use slot::{CameraSlot, FpsCounter, SlotState};
