//! NVR node binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use nvr_coordinator::{CameraSetup, Coordinator, MotionReporter, TickDriver};
use nvr_media::source::available_devices;
use nvr_media::{
    CaptureConfig, DetectorSet, FfmpegCapture, FfmpegRecorder, FrameSource, NullRecorder, Recorder,
    TestPatternSource,
};
use nvr_models::CameraId;
use nvr_storage::{FileConfigStore, SettingsRepository};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nvr_api::{create_router, metrics, AppState, CaptureBackend, NodeConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing()?;

    info!("Starting nvr-node");

    let config = NodeConfig::from_env().context("invalid node configuration")?;
    info!(
        host = %config.host,
        port = config.port,
        cameras = ?config.camera_ids,
        backend = ?config.capture_backend,
        "Node config loaded"
    );

    // Settings for every camera; a failure here is fatal
    let store: Arc<dyn SettingsRepository> = Arc::new(FileConfigStore::new(&config.settings_dir));
    let mut settings = Vec::with_capacity(config.camera_ids.len());
    for camera_id in &config.camera_ids {
        let record = store
            .load(*camera_id)
            .await
            .with_context(|| format!("failed to load settings for camera {}", camera_id))?;
        settings.push(record);
    }

    if config.capture_backend == CaptureBackend::Ffmpeg {
        let found = available_devices(16);
        info!(devices = ?found, "Local video devices");
    }

    let detectors = Arc::new(build_detectors(&config));

    // Opening devices blocks while waiting for first frames
    let sources = {
        let config = config.clone();
        tokio::task::spawn_blocking(move || {
            config
                .camera_ids
                .iter()
                .map(|id| (*id, open_source(&config, *id)))
                .collect::<Vec<_>>()
        })
        .await
        .context("camera open task failed")?
    };

    let mut builder = Coordinator::builder(store)
        .detectors(detectors)
        .reconnect_interval(config.reconnect_interval);
    for (record, (camera_id, source)) in settings.into_iter().zip(sources) {
        builder = builder.camera(
            CameraSetup::new(record, source).with_recorder(build_recorder(&config, camera_id)),
        );
    }
    let coordinator = Arc::new(builder.build().context("failed to build coordinator")?);

    // Initialize metrics
    let metrics_handle = if config.metrics_enabled {
        match metrics::init_metrics() {
            Ok(handle) => {
                info!("Prometheus metrics enabled at /metrics");
                Some(handle)
            }
            Err(e) => {
                warn!(error = %e, "Failed to install Prometheus recorder, metrics disabled");
                None
            }
        }
    } else {
        None
    };

    // Background loops
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let driver = tokio::spawn(
        TickDriver::new(coordinator.clone(), config.tick_interval).run(shutdown_rx.clone()),
    );
    let reporter = tokio::spawn(
        MotionReporter::new(coordinator.clone(), config.report_interval).run(shutdown_rx),
    );

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", config.host, config.port))?;

    let state = AppState::new(config, coordinator.clone());
    let app = create_router(state, metrics_handle);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // Stop the tick before touching recorders so no write races the stop
    let _ = shutdown_tx.send(true);
    if let Err(e) = driver.await {
        error!(error = %e, "Capture tick task failed");
    }
    if let Err(e) = reporter.await {
        error!(error = %e, "Motion reporter task failed");
    }

    let finalise = coordinator.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || finalise.shutdown()).await {
        error!(error = %e, "Coordinator shutdown failed");
    }

    served.context("server error")?;
    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    // JSON for production, colored output otherwise
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("nvr=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

/// Frame source for one camera. Failing to start a device leaves the slot
/// unconnected; the tick keeps trying to reopen it.
fn open_source(config: &NodeConfig, camera_id: CameraId) -> Box<dyn FrameSource> {
    let name = format!("cam{}", camera_id);
    match config.capture_backend {
        CaptureBackend::TestPattern => Box::new(
            TestPatternSource::new(name, config.capture_width, config.capture_height)
                .with_motion(true),
        ),
        CaptureBackend::Ffmpeg => {
            let capture = match config.source_for(camera_id) {
                Some(url) => CaptureConfig::for_url(url),
                None => CaptureConfig::for_device(camera_id.as_u32())
                    .with_format(config.capture_format.clone()),
            }
            .with_geometry(config.capture_width, config.capture_height, config.capture_fps);

            match FfmpegCapture::open(name.clone(), capture.clone()) {
                Ok(source) => Box::new(source),
                Err(e) => {
                    error!(camera_id = %camera_id, error = %e, "Failed to open camera");
                    Box::new(FfmpegCapture::unopened(name, capture))
                }
            }
        }
    }
}

fn build_recorder(config: &NodeConfig, camera_id: CameraId) -> Box<dyn Recorder> {
    if config.recording_enabled {
        Box::new(FfmpegRecorder::new(
            camera_id,
            &config.recordings_dir,
            config.capture_fps,
        ))
    } else {
        Box::new(NullRecorder)
    }
}

#[cfg(feature = "onnx")]
fn build_detectors(config: &NodeConfig) -> DetectorSet {
    use nvr_media::{ObjectDetector, ObjectDetectorConfig};

    let mut set = DetectorSet::new();
    for (kind, path) in &config.model_paths {
        match ObjectDetector::new(ObjectDetectorConfig::new(*kind, path)) {
            Ok(detector) => {
                if let Err(e) = set.insert(Arc::new(detector)) {
                    warn!(kind = %kind, error = %e, "Detector rejected");
                } else {
                    info!(kind = %kind, model = %path.display(), "Detector loaded");
                }
            }
            Err(e) => {
                warn!(kind = %kind, model = %path.display(), error = %e, "Failed to load detector, kind disabled");
            }
        }
    }
    set
}

#[cfg(not(feature = "onnx"))]
fn build_detectors(config: &NodeConfig) -> DetectorSet {
    if !config.model_paths.is_empty() {
        warn!(
            kinds = ?config.model_paths.keys().collect::<Vec<_>>(),
            "Detector models configured but this build has no ONNX support"
        );
    }
    DetectorSet::new()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
