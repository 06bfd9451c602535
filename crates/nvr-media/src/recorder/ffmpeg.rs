use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use chrono::{DateTime, Utc};
use nvr_models::CameraId;
use tracing::{info, warn};

use super::Recorder;
use crate::command::{find_ffmpeg, FfmpegCommand};
use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;

struct Session {
    child: Child,
    stdin: ChildStdin,
    path: PathBuf,
    dimensions: (u32, u32),
}

/// Pipes raw frames into ffmpeg writing `camera_{id}_{timestamp}.avi`.
///
/// The process starts with the first frame so the file takes that frame's
/// geometry; a later frame of a different size fails the recording.
pub struct FfmpegRecorder {
    camera_id: CameraId,
    dir: PathBuf,
    fps: u32,
    session: Option<Session>,
    failed: bool,
}

impl FfmpegRecorder {
    pub fn new(camera_id: CameraId, dir: impl Into<PathBuf>, fps: u32) -> Self {
        Self {
            camera_id,
            dir: dir.into(),
            fps: fps.max(1),
            session: None,
            failed: false,
        }
    }

    /// File name for a recording started at `started_at`.
    pub fn file_name(camera_id: CameraId, started_at: DateTime<Utc>) -> String {
        format!(
            "camera_{}_{}.avi",
            camera_id,
            started_at.format("%Y%m%d_%H%M%S")
        )
    }

    fn start(&mut self, width: u32, height: u32) -> MediaResult<Session> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self
            .dir
            .join(Self::file_name(self.camera_id, Utc::now()));

        let args = FfmpegCommand::new("pipe:0", path.to_string_lossy())
            .raw_rgb_input(width, height, self.fps)
            .video_codec("mpeg4")
            .output_arg("-vtag")
            .output_arg("xvid")
            .output_arg("-q:v")
            .output_arg("5")
            .build_args_with_stdin();

        let mut child = Command::new(find_ffmpeg()?)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| MediaError::recorder_failed(format!("failed to spawn ffmpeg: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| MediaError::internal("ffmpeg stdin not captured"))?;

        info!(
            camera_id = %self.camera_id,
            path = %path.display(),
            width,
            height,
            "Recording started"
        );

        Ok(Session {
            child,
            stdin,
            path,
            dimensions: (width, height),
        })
    }
}

impl Recorder for FfmpegRecorder {
    fn write(&mut self, frame: &Frame) -> MediaResult<()> {
        if self.failed {
            return Err(MediaError::recorder_failed("recording already failed"));
        }

        if self.session.is_none() {
            let (width, height) = frame.dimensions();
            match self.start(width, height) {
                Ok(session) => self.session = Some(session),
                Err(e) => {
                    self.failed = true;
                    return Err(e);
                }
            }
        }

        let Some(session) = self.session.as_mut() else {
            return Err(MediaError::internal("recording session missing"));
        };

        if frame.dimensions() != session.dimensions {
            let message = format!(
                "frame size {:?} differs from recording size {:?}",
                frame.dimensions(),
                session.dimensions
            );
            self.failed = true;
            return Err(MediaError::recorder_failed(message));
        }

        if let Err(e) = session.stdin.write_all(frame.as_raw()) {
            self.failed = true;
            return Err(MediaError::recorder_failed(format!("write to ffmpeg failed: {}", e)));
        }
        Ok(())
    }

    fn stop(&mut self) -> MediaResult<()> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        let Session {
            mut child,
            stdin,
            path,
            ..
        } = session;

        // Closing stdin lets ffmpeg flush and write the trailer.
        drop(stdin);
        let status = child.wait()?;
        if status.success() {
            info!(camera_id = %self.camera_id, path = %path.display(), "Recording finalised");
            Ok(())
        } else {
            warn!(camera_id = %self.camera_id, path = %path.display(), %status, "ffmpeg exited with error");
            Err(MediaError::recorder_failed(format!("ffmpeg exited with {}", status)))
        }
    }

    fn is_recording(&self) -> bool {
        self.session.is_some() && !self.failed
    }

    fn output_path(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.path.as_path())
    }
}

impl Drop for FfmpegRecorder {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(camera_id = %self.camera_id, error = %e, "Failed to finalise recording");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn file_name_carries_camera_and_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(
            FfmpegRecorder::file_name(CameraId::new(2), at),
            "camera_2_20240309_070501.avi"
        );
    }

    #[test]
    fn idle_recorder_stops_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = FfmpegRecorder::new(CameraId::new(0), dir.path(), 20);
        assert!(!recorder.is_recording());
        assert!(recorder.stop().is_ok());
        assert!(recorder.output_path().is_none());
    }
}
