//! Background loops driving the coordinator.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::coordinator::Coordinator;

/// Runs [`Coordinator::tick`] on a fixed period.
///
/// Each pass runs on the blocking pool and is awaited before the next
/// period starts, so passes never overlap. A pass that overruns delays the
/// next one instead of queueing a burst.
pub struct TickDriver {
    coordinator: Arc<Coordinator>,
    period: Duration,
}

impl TickDriver {
    pub fn new(coordinator: Arc<Coordinator>, period: Duration) -> Self {
        Self {
            coordinator,
            period,
        }
    }

    /// Run until `shutdown` flips to true or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(period_ms = self.period.as_millis() as u64, "Starting capture tick");

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }

            let coordinator = self.coordinator.clone();
            match tokio::task::spawn_blocking(move || coordinator.tick()).await {
                Ok(summary) => {
                    if summary.duration > self.period {
                        debug!(
                            duration_ms = summary.duration.as_millis() as u64,
                            period_ms = self.period.as_millis() as u64,
                            "Tick overran its period"
                        );
                    }
                }
                Err(e) => {
                    error!(error = %e, "Capture tick panicked");
                }
            }
        }

        info!("Capture tick stopped");
    }
}

/// Logs a motion summary on its own period. Read-only.
pub struct MotionReporter {
    coordinator: Arc<Coordinator>,
    period: Duration,
}

impl MotionReporter {
    pub fn new(coordinator: Arc<Coordinator>, period: Duration) -> Self {
        Self {
            coordinator,
            period,
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    for line in self.coordinator.motion_report() {
                        info!(target: "nvr::motion", "{}", line);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::CameraSetup;
    use nvr_media::{MemoryRecorder, ScriptedSource};
    use nvr_models::{CameraId, CameraSettings};
    use nvr_storage::MemoryConfigStore;

    #[tokio::test]
    async fn driver_ticks_until_shutdown() {
        let source = ScriptedSource::new("cam0");
        let recorder = MemoryRecorder::new();
        for _ in 0..3 {
            source.push_filled(8, 8, [1, 1, 1]);
        }
        let coordinator = Arc::new(
            Coordinator::builder(Arc::new(MemoryConfigStore::new()))
                .camera(
                    CameraSetup::new(CameraSettings::defaults(CameraId(0)), Box::new(source.clone()))
                        .with_recorder(Box::new(recorder.clone())),
                )
                .build()
                .unwrap(),
        );

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(
            TickDriver::new(coordinator.clone(), Duration::from_millis(5)).run(rx),
        );

        for _ in 0..200 {
            if source.pending() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(recorder.frames_written(), 3);
        assert!(coordinator.last_tick_age().is_some());
    }

    #[tokio::test]
    async fn reporter_stops_when_sender_dropped() {
        let coordinator = Arc::new(
            Coordinator::builder(Arc::new(MemoryConfigStore::new()))
                .build()
                .unwrap(),
        );
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(
            MotionReporter::new(coordinator, Duration::from_millis(5)).run(rx),
        );
        drop(tx);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
