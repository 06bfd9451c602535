use std::io::Read;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::{CaptureConfig, FrameSource};
use crate::command::{find_ffmpeg, FfmpegCommand};
use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;

/// State shared with one reader thread. Every spawn gets a fresh one so a
/// reader left over from a previous process cannot publish frames.
#[derive(Default)]
struct Shared {
    latest: Mutex<Option<Frame>>,
    streaming: AtomicBool,
}

/// Camera captured through an `ffmpeg` child emitting raw RGB24 frames.
///
/// A reader thread keeps only the newest frame, so [`read_frame`] never
/// waits on the device.
///
/// [`read_frame`]: FrameSource::read_frame
pub struct FfmpegCapture {
    name: String,
    config: CaptureConfig,
    child: Option<Child>,
    shared: Arc<Shared>,
}

impl FfmpegCapture {
    /// Spawn ffmpeg and wait up to `open_timeout` for the first frame.
    ///
    /// A device that does not answer in time is still returned, unconnected;
    /// it can come up later or be reopened with [`FrameSource::reconnect`].
    pub fn open(name: impl Into<String>, config: CaptureConfig) -> MediaResult<Self> {
        let mut capture = Self::unopened(name, config);
        capture.spawn()?;

        let deadline = Instant::now() + capture.config.open_timeout;
        while Instant::now() < deadline {
            if capture.is_connected() {
                info!(source = %capture.name, input = %capture.config.input, "Capture opened");
                return Ok(capture);
            }
            if capture.exited() {
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }

        warn!(
            source = %capture.name,
            input = %capture.config.input,
            "Capture device did not deliver a frame"
        );
        Ok(capture)
    }

    /// Capture with no process behind it, for a device whose first spawn
    /// failed. Stays unconnected until [`FrameSource::reconnect`] succeeds.
    pub fn unopened(name: impl Into<String>, config: CaptureConfig) -> Self {
        Self {
            name: name.into(),
            config,
            child: None,
            shared: Arc::new(Shared::default()),
        }
    }

    fn build_args(&self) -> Vec<String> {
        let mut cmd = FfmpegCommand::new(self.config.input.clone(), "pipe:1");
        if let Some(format) = &self.config.format {
            cmd = cmd.input_format(format.clone());
        }
        if self.config.format.is_some() {
            cmd = cmd
                .input_arg("-framerate")
                .input_arg(self.config.fps.to_string());
        }
        cmd.raw_rgb_output(self.config.width, self.config.height)
            .build_args()
    }

    fn spawn(&mut self) -> MediaResult<()> {
        let ffmpeg = find_ffmpeg()?;
        let mut child = Command::new(ffmpeg)
            .args(self.build_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                MediaError::device_unavailable(format!("{}: failed to spawn ffmpeg: {}", self.name, e))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("ffmpeg stdout not captured"))?;

        let shared = Arc::new(Shared::default());
        let reader_shared = shared.clone();
        let (width, height) = (self.config.width, self.config.height);
        let name = self.name.clone();

        thread::Builder::new()
            .name(format!("capture-{}", self.name))
            .spawn(move || read_frames(stdout, width, height, reader_shared, name))?;

        self.child = Some(child);
        self.shared = shared;
        Ok(())
    }

    fn exited(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => !matches!(child.try_wait(), Ok(None)),
            None => true,
        }
    }

    fn kill(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        self.shared.streaming.store(false, Ordering::Release);
    }
}

fn read_frames(mut stdout: ChildStdout, width: u32, height: u32, shared: Arc<Shared>, name: String) {
    let frame_size = width as usize * height as usize * 3;
    let mut seq = 0u64;
    loop {
        let mut buf = vec![0u8; frame_size];
        if let Err(e) = stdout.read_exact(&mut buf) {
            debug!(source = %name, error = %e, "Capture stream ended");
            break;
        }
        seq += 1;
        match Frame::from_rgb24(width, height, buf, seq) {
            Ok(frame) => {
                *shared.latest.lock() = Some(frame);
                shared.streaming.store(true, Ordering::Release);
            }
            Err(e) => {
                warn!(source = %name, error = %e, "Dropping malformed frame");
            }
        }
    }
    shared.streaming.store(false, Ordering::Release);
}

impl FrameSource for FfmpegCapture {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.shared.streaming.load(Ordering::Acquire)
    }

    fn read_frame(&mut self) -> MediaResult<Option<Frame>> {
        if !self.is_connected() {
            return Err(MediaError::device_unavailable(format!(
                "{} is not streaming",
                self.name
            )));
        }
        Ok(self.shared.latest.lock().take())
    }

    fn reconnect(&mut self) -> MediaResult<()> {
        debug!(source = %self.name, input = %self.config.input, "Reopening capture device");
        self.kill();
        self.spawn()
    }

    fn close(&mut self) {
        self.kill();
    }
}

impl Drop for FfmpegCapture {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_args_include_format_and_rate() {
        let capture = FfmpegCapture::unopened(
            "cam0",
            CaptureConfig::default()
                .with_format(Some("v4l2".to_string()))
                .with_geometry(320, 240, 10),
        );
        let args = capture.build_args();
        assert!(args.windows(2).any(|w| w == ["-f", "v4l2"]));
        assert!(args.windows(2).any(|w| w == ["-framerate", "10"]));
        assert!(args.contains(&"scale=320:240".to_string()));
    }

    #[test]
    fn url_args_skip_framerate() {
        let capture = FfmpegCapture::unopened("cam1", CaptureConfig::for_url("rtsp://cam.local/stream"));
        let args = capture.build_args();
        assert!(!args.contains(&"-framerate".to_string()));
        assert!(!args.contains(&"v4l2".to_string()));
    }

    #[test]
    fn unspawned_capture_is_unavailable() {
        let mut capture = FfmpegCapture::unopened("cam2", CaptureConfig::default());
        assert!(!capture.is_connected());
        assert!(matches!(
            capture.read_frame(),
            Err(MediaError::DeviceUnavailable(_))
        ));
    }
}
