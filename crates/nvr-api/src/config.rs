//! Node configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use nvr_media::DEFAULT_JPEG_QUALITY;
use nvr_models::{CameraId, DetectorKind};
use thiserror::Error;

/// Configuration that cannot be turned into a runnable node.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid camera id '{0}' in NVR_CAMERA_IDS")]
    CameraId(String),

    #[error("invalid camera source '{0}' in NVR_CAMERA_SOURCES, expected id=url")]
    CameraSource(String),

    #[error("unknown capture backend '{0}', expected ffmpeg or test-pattern")]
    Backend(String),

    #[error("no cameras configured")]
    NoCameras,
}

/// Where camera frames come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureBackend {
    Ffmpeg,
    TestPattern,
}

impl FromStr for CaptureBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ffmpeg" => Ok(CaptureBackend::Ffmpeg),
            "test-pattern" | "test_pattern" => Ok(CaptureBackend::TestPattern),
            other => Err(ConfigError::Backend(other.to_string())),
        }
    }
}

/// NVR node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Camera ids, ascending and unique
    pub camera_ids: Vec<CameraId>,
    /// Per-camera input overrides (stream URLs or device paths)
    pub camera_sources: BTreeMap<CameraId, String>,
    pub capture_backend: CaptureBackend,
    /// ffmpeg input format for local devices; `None` lets ffmpeg probe
    pub capture_format: Option<String>,
    pub capture_width: u32,
    pub capture_height: u32,
    pub capture_fps: u32,
    /// Per-camera settings records
    pub settings_dir: PathBuf,
    pub recordings_dir: PathBuf,
    pub recording_enabled: bool,
    pub tick_interval: Duration,
    pub report_interval: Duration,
    pub reconnect_interval: Duration,
    /// A stream ends once its camera has been unconnected this long
    pub stream_disconnect_grace: Duration,
    pub jpeg_quality: u8,
    /// ONNX model per annotation detector
    pub model_paths: BTreeMap<DetectorKind, PathBuf>,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Max request body size
    pub max_body_size: usize,
    pub metrics_enabled: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            camera_ids: vec![CameraId(0)],
            camera_sources: BTreeMap::new(),
            capture_backend: CaptureBackend::Ffmpeg,
            capture_format: nvr_media::source::default_input_format().map(str::to_string),
            capture_width: 640,
            capture_height: 480,
            capture_fps: 20,
            settings_dir: PathBuf::from("./configs/camsettings"),
            recordings_dir: PathBuf::from("./recordings"),
            recording_enabled: true,
            tick_interval: Duration::from_millis(30),
            report_interval: Duration::from_millis(1000),
            reconnect_interval: Duration::from_millis(5000),
            stream_disconnect_grace: Duration::from_millis(10_000),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            model_paths: BTreeMap::new(),
            cors_origins: vec!["*".to_string()],
            max_body_size: 64 * 1024,
            metrics_enabled: true,
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on"))
}

fn env_millis(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_millis)
}

impl NodeConfig {
    /// Create config from environment variables.
    ///
    /// Unset or unparsable scalars fall back to their defaults. Camera
    /// lists and the capture backend are rejected when malformed, since
    /// guessing there would silently open the wrong devices.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let camera_ids = match std::env::var("NVR_CAMERA_IDS") {
            Ok(raw) => parse_camera_ids(&raw)?,
            Err(_) => defaults.camera_ids,
        };
        let camera_sources = match std::env::var("NVR_CAMERA_SOURCES") {
            Ok(raw) => parse_camera_sources(&raw)?,
            Err(_) => BTreeMap::new(),
        };
        let capture_backend = match std::env::var("NVR_CAPTURE_BACKEND") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.capture_backend,
        };

        let mut model_paths = BTreeMap::new();
        for kind in DetectorKind::ANNOTATION_ORDER {
            let key = format!("NVR_MODEL_{}", kind.as_str().to_uppercase());
            if let Ok(path) = std::env::var(&key) {
                if !path.trim().is_empty() {
                    model_paths.insert(kind, PathBuf::from(path.trim()));
                }
            }
        }

        Ok(Self {
            host: std::env::var("NVR_HOST").unwrap_or(defaults.host),
            port: env_parse("NVR_PORT").unwrap_or(defaults.port),
            camera_ids,
            camera_sources,
            capture_backend,
            capture_format: std::env::var("NVR_CAPTURE_FORMAT")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .or(defaults.capture_format),
            capture_width: env_parse("NVR_CAPTURE_WIDTH").unwrap_or(defaults.capture_width),
            capture_height: env_parse("NVR_CAPTURE_HEIGHT").unwrap_or(defaults.capture_height),
            capture_fps: env_parse("NVR_CAPTURE_FPS").unwrap_or(defaults.capture_fps),
            settings_dir: std::env::var("NVR_SETTINGS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.settings_dir),
            recordings_dir: std::env::var("NVR_RECORDINGS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.recordings_dir),
            recording_enabled: env_flag("NVR_RECORDING_ENABLED").unwrap_or(defaults.recording_enabled),
            tick_interval: env_millis("NVR_TICK_INTERVAL_MS")
                .filter(|d| !d.is_zero())
                .unwrap_or(defaults.tick_interval),
            report_interval: env_millis("NVR_REPORT_INTERVAL_MS")
                .filter(|d| !d.is_zero())
                .unwrap_or(defaults.report_interval),
            reconnect_interval: env_millis("NVR_RECONNECT_INTERVAL_MS")
                .unwrap_or(defaults.reconnect_interval),
            stream_disconnect_grace: env_millis("NVR_STREAM_DISCONNECT_GRACE_MS")
                .unwrap_or(defaults.stream_disconnect_grace),
            jpeg_quality: env_parse::<u8>("NVR_JPEG_QUALITY")
                .map(|q| q.clamp(1, 100))
                .unwrap_or(defaults.jpeg_quality),
            model_paths,
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            max_body_size: env_parse("MAX_BODY_SIZE").unwrap_or(defaults.max_body_size),
            metrics_enabled: env_flag("METRICS_ENABLED").unwrap_or(defaults.metrics_enabled),
        })
    }

    /// Input for `camera_id`: the configured override, if any.
    pub fn source_for(&self, camera_id: CameraId) -> Option<&str> {
        self.camera_sources.get(&camera_id).map(String::as_str)
    }
}

/// Parse `0,2,1` into sorted, de-duplicated ids.
pub fn parse_camera_ids(raw: &str) -> Result<Vec<CameraId>, ConfigError> {
    let mut ids = Vec::new();
    for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let id = token
            .parse::<CameraId>()
            .map_err(|_| ConfigError::CameraId(token.to_string()))?;
        ids.push(id);
    }
    ids.sort();
    ids.dedup();
    if ids.is_empty() {
        return Err(ConfigError::NoCameras);
    }
    Ok(ids)
}

/// Parse `0=/dev/video0,2=rtsp://host/stream`.
pub fn parse_camera_sources(raw: &str) -> Result<BTreeMap<CameraId, String>, ConfigError> {
    let mut sources = BTreeMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (id, url) = entry
            .split_once('=')
            .ok_or_else(|| ConfigError::CameraSource(entry.to_string()))?;
        let id = id
            .trim()
            .parse::<CameraId>()
            .map_err(|_| ConfigError::CameraSource(entry.to_string()))?;
        let url = url.trim();
        if url.is_empty() {
            return Err(ConfigError::CameraSource(entry.to_string()));
        }
        sources.insert(id, url.to_string());
    }
    Ok(sources)
}
