//! Application state.

use std::sync::Arc;

use nvr_coordinator::Coordinator;

use crate::config::NodeConfig;

/// Shared application state.
///
/// Handlers reach camera state only through the coordinator; there is no
/// other process-wide mutable state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<NodeConfig>,
    pub coordinator: Arc<Coordinator>,
}

impl AppState {
    pub fn new(config: NodeConfig, coordinator: Arc<Coordinator>) -> Self {
        Self {
            config: Arc::new(config),
            coordinator,
        }
    }
}
