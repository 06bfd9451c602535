//! MJPEG live stream handler.
//!
//! Every client gets its own producer. Each part is the camera's latest
//! frame with that camera's enabled detectors applied, whether or not it is
//! the active display camera. Detection and encoding run on the blocking
//! pool from a snapshot, so no slot lock is held while they run.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use futures_util::stream;
use nvr_coordinator::{CameraSlot, Coordinator};
use nvr_media::encode_jpeg;
use nvr_models::CameraId;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::metrics::{self, StreamGauge};
use crate::state::AppState;

/// Multipart boundary between JPEG parts.
pub const BOUNDARY: &str = "frame";

/// One multipart body part wrapping `jpeg`.
pub fn multipart_part(jpeg: &[u8]) -> Vec<u8> {
    let head = format!("--{}\r\nContent-Type: image/jpeg\r\n\r\n", BOUNDARY);
    let mut part = Vec::with_capacity(head.len() + jpeg.len() + 2);
    part.extend_from_slice(head.as_bytes());
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    part
}

/// Stream the camera as `multipart/x-mixed-replace` JPEG parts.
///
/// Unknown cameras are 404 and unconnected ones 503. Once started, the
/// stream ends when the client goes away or the camera stays unconnected
/// past the configured grace period.
pub async fn video_feed(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
) -> ApiResult<Response> {
    let camera_id: CameraId = camera_id
        .parse()
        .map_err(|_| ApiError::bad_request(format!("'{}' is not a camera id", camera_id)))?;

    let slot = state.coordinator.slot(camera_id)?;
    if !slot.is_connected() {
        return Err(ApiError::unavailable(format!(
            "camera {} is not connected",
            camera_id
        )));
    }

    info!(camera_id = %camera_id, "Stream opened");

    let feed = FrameFeed::new(
        state.coordinator.clone(),
        slot,
        state.config.tick_interval,
        state.config.stream_disconnect_grace,
        state.config.jpeg_quality,
    );
    let parts = stream::unfold(feed, FrameFeed::next_part);

    Response::builder()
        .status(StatusCode::OK)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/x-mixed-replace; boundary={}", BOUNDARY),
        )
        .header(header::CACHE_CONTROL, "no-cache, no-store, must-revalidate")
        .header(header::PRAGMA, "no-cache")
        .body(Body::from_stream(parts))
        .map_err(|e| ApiError::internal(format!("Failed to build response: {}", e)))
}

/// Producer state of one stream client.
struct FrameFeed {
    coordinator: Arc<Coordinator>,
    slot: Arc<CameraSlot>,
    ticker: Interval,
    grace: Duration,
    quality: u8,
    /// Sequence of the last frame sent; unchanged frames are not resent.
    last_seq: u64,
    lost_at: Option<Instant>,
    _gauge: StreamGauge,
}

impl FrameFeed {
    fn new(
        coordinator: Arc<Coordinator>,
        slot: Arc<CameraSlot>,
        poll: Duration,
        grace: Duration,
        quality: u8,
    ) -> Self {
        let mut ticker = interval(poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let gauge = StreamGauge::open(slot.id());
        Self {
            coordinator,
            slot,
            ticker,
            grace,
            quality,
            last_seq: 0,
            lost_at: None,
            _gauge: gauge,
        }
    }

    async fn next_part(mut self) -> Option<(Result<Vec<u8>, Infallible>, Self)> {
        let camera_id = self.slot.id();
        loop {
            self.ticker.tick().await;

            let snapshot = self.slot.snapshot();
            if !snapshot.connected {
                let lost_at = *self
                    .lost_at
                    .get_or_insert_with(|| snapshot.disconnected_since.unwrap_or_else(Instant::now));
                if lost_at.elapsed() >= self.grace {
                    info!(camera_id = %camera_id, "Camera stayed unconnected, ending stream");
                    return None;
                }
                continue;
            }
            self.lost_at = None;

            let Some(frame) = snapshot.latest_frame else {
                continue;
            };
            if snapshot.frame_seq == self.last_seq {
                continue;
            }
            self.last_seq = snapshot.frame_seq;

            let coordinator = self.coordinator.clone();
            let flags = snapshot.flags;
            let quality = self.quality;
            let encoded = tokio::task::spawn_blocking(move || {
                let annotated = coordinator.annotate(camera_id, &frame, &flags);
                encode_jpeg(&annotated, quality)
            })
            .await;

            match encoded {
                Ok(Ok(jpeg)) => {
                    metrics::record_stream_frame(camera_id);
                    return Some((Ok(multipart_part(&jpeg)), self));
                }
                Ok(Err(e)) => {
                    warn!(camera_id = %camera_id, error = %e, "Skipping frame that failed to encode");
                    metrics::record_encode_failure(camera_id);
                }
                Err(e) => {
                    error!(camera_id = %camera_id, error = %e, "Frame encoding task failed");
                    metrics::record_encode_failure(camera_id);
                }
            }
        }
    }
}

impl Drop for FrameFeed {
    fn drop(&mut self) {
        debug!(camera_id = %self.slot.id(), last_seq = self.last_seq, "Stream closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_is_boundary_delimited_jpeg() {
        let part = multipart_part(&[0xFF, 0xD8, 0xFF, 0xD9]);
        let head = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";
        assert!(part.starts_with(head));
        assert_eq!(&part[head.len()..head.len() + 4], &[0xFF, 0xD8, 0xFF, 0xD9]);
        assert!(part.ends_with(b"\r\n"));
    }
}
