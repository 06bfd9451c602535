//! Camera frame sources.
//!
//! A [`FrameSource`] owns one capture device. Reads never block the caller
//! for longer than it takes to hand over the newest buffered frame.

mod ffmpeg;
pub mod mock;
mod test_pattern;

use std::path::Path;
use std::time::Duration;

pub use ffmpeg::FfmpegCapture;
pub use mock::ScriptedSource;
pub use test_pattern::TestPatternSource;

use crate::error::MediaResult;
use crate::frame::Frame;

/// One capture device.
pub trait FrameSource: Send {
    /// Human readable device name for logs.
    fn name(&self) -> &str;

    /// True while the device is delivering frames.
    fn is_connected(&self) -> bool;

    /// Newest frame since the previous call.
    ///
    /// `Ok(None)` means nothing new arrived yet. An error means the device
    /// is gone; [`is_connected`](Self::is_connected) is false afterwards.
    fn read_frame(&mut self) -> MediaResult<Option<Frame>>;

    /// Start reopening the device without waiting for it. Success shows up
    /// later through [`is_connected`](Self::is_connected).
    fn reconnect(&mut self) -> MediaResult<()>;

    /// Release the device.
    fn close(&mut self);
}

/// Capture settings for one device.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Device path, device index or stream URL
    pub input: String,
    /// ffmpeg input format (`v4l2`, `avfoundation`, `dshow`); `None` lets
    /// ffmpeg probe, which is what stream URLs need
    pub format: Option<String>,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// How long `open` waits for the first frame
    pub open_timeout: Duration,
}

impl CaptureConfig {
    /// Local device `index` with the platform's capture format.
    pub fn for_device(index: u32) -> Self {
        Self {
            input: device_input(index),
            format: default_input_format().map(str::to_string),
            ..Self::default()
        }
    }

    /// Stream URL or file, probed by ffmpeg.
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            input: url.into(),
            format: None,
            ..Self::default()
        }
    }

    pub fn with_geometry(mut self, width: u32, height: u32, fps: u32) -> Self {
        self.width = width;
        self.height = height;
        self.fps = fps;
        self
    }

    pub fn with_format(mut self, format: Option<String>) -> Self {
        self.format = format;
        self
    }

    pub fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            input: device_input(0),
            format: default_input_format().map(str::to_string),
            width: 640,
            height: 480,
            fps: 20,
            open_timeout: Duration::from_secs(3),
        }
    }
}

/// ffmpeg input format for local cameras on this platform.
pub fn default_input_format() -> Option<&'static str> {
    if cfg!(target_os = "linux") {
        Some("v4l2")
    } else if cfg!(target_os = "macos") {
        Some("avfoundation")
    } else if cfg!(target_os = "windows") {
        Some("dshow")
    } else {
        None
    }
}

fn device_input(index: u32) -> String {
    if cfg!(target_os = "linux") {
        format!("/dev/video{}", index)
    } else if cfg!(target_os = "windows") {
        format!("video={}", index)
    } else {
        index.to_string()
    }
}

/// Local video device indices below `max` that exist.
///
/// Only Linux exposes devices as files; elsewhere nothing can be probed
/// without opening the device and the result is empty.
pub fn available_devices(max: u32) -> Vec<u32> {
    if !cfg!(target_os = "linux") {
        return Vec::new();
    }
    (0..max)
        .filter(|i| Path::new(&device_input(*i)).exists())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_sources_are_probed() {
        let config = CaptureConfig::for_url("rtsp://cam.local/stream").with_geometry(320, 240, 15);
        assert!(config.format.is_none());
        assert_eq!(config.frame_size(), 320 * 240 * 3);
        assert_eq!(config.fps, 15);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn linux_devices_use_v4l2() {
        let config = CaptureConfig::for_device(2);
        assert_eq!(config.input, "/dev/video2");
        assert_eq!(config.format.as_deref(), Some("v4l2"));
    }
}
