//! Health check handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

/// Tick periods without a completed tick before the node is reported
/// not ready.
const READY_TICK_PERIODS: u32 = 10;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub cameras: usize,
    pub connected: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_tick_ms: Option<u64>,
}

/// Readiness check endpoint (readiness probe).
/// Ready while the capture tick keeps running.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let statuses = state.coordinator.statuses();
    let last_tick = state.coordinator.last_tick_age();
    let limit = state.config.tick_interval * READY_TICK_PERIODS;
    let ticking = last_tick.is_some_and(|age| age <= limit);

    let response = ReadinessResponse {
        status: if ticking { "ready" } else { "not_ready" }.to_string(),
        cameras: statuses.len(),
        connected: statuses.iter().filter(|s| s.connected).count(),
        last_tick_ms: last_tick.map(|age| age.as_millis() as u64),
    };

    if ticking {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}
