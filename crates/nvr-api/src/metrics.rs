//! Prometheus metrics for the HTTP server.

use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use nvr_models::CameraId;

/// Install the Prometheus recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "nvr_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "nvr_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "nvr_http_requests_in_flight";

    // Stream metrics
    pub const STREAMS_ACTIVE: &str = "nvr_streams_active";
    pub const STREAM_FRAMES_TOTAL: &str = "nvr_stream_frames_total";
    pub const STREAM_ENCODE_FAILURES_TOTAL: &str = "nvr_stream_encode_failures_total";

    // Config metrics
    pub const CONFIG_UPDATES_TOTAL: &str = "nvr_config_updates_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record one JPEG part sent to a stream client.
pub fn record_stream_frame(camera_id: CameraId) {
    let labels = [("camera", camera_id.to_string())];
    counter!(names::STREAM_FRAMES_TOTAL, &labels).increment(1);
}

/// Record a frame dropped from a stream because it could not be encoded.
pub fn record_encode_failure(camera_id: CameraId) {
    let labels = [("camera", camera_id.to_string())];
    counter!(names::STREAM_ENCODE_FAILURES_TOTAL, &labels).increment(1);
}

/// Record a detector configuration change.
pub fn record_config_update(camera_id: CameraId) {
    let labels = [("camera", camera_id.to_string())];
    counter!(names::CONFIG_UPDATES_TOTAL, &labels).increment(1);
}

/// Counts one open stream in the active-streams gauge until dropped.
pub struct StreamGauge {
    labels: [(&'static str, String); 1],
}

impl StreamGauge {
    pub fn open(camera_id: CameraId) -> Self {
        let labels = [("camera", camera_id.to_string())];
        gauge!(names::STREAMS_ACTIVE, &labels).increment(1.0);
        Self { labels }
    }
}

impl Drop for StreamGauge {
    fn drop(&mut self) {
        gauge!(names::STREAMS_ACTIVE, &self.labels).decrement(1.0);
    }
}

/// Collapse numeric path segments so camera ids don't explode label
/// cardinality.
fn sanitize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
