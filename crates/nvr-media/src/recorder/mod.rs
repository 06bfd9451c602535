//! Continuous per-camera recording.

mod ffmpeg;
pub mod mock;

use std::path::Path;

pub use ffmpeg::FfmpegRecorder;
pub use mock::MemoryRecorder;

use crate::error::MediaResult;
use crate::frame::Frame;

/// Writer bound to one camera slot.
pub trait Recorder: Send {
    /// Append one frame. An error means the recording is unusable and the
    /// caller should [`stop`](Self::stop) it.
    fn write(&mut self, frame: &Frame) -> MediaResult<()>;

    /// Finalise the file. Safe to call more than once.
    fn stop(&mut self) -> MediaResult<()>;

    fn is_recording(&self) -> bool;

    /// File currently being written, if any.
    fn output_path(&self) -> Option<&Path> {
        None
    }
}

/// Recorder used when recording is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRecorder;

impl Recorder for NullRecorder {
    fn write(&mut self, _frame: &Frame) -> MediaResult<()> {
        Ok(())
    }

    fn stop(&mut self) -> MediaResult<()> {
        Ok(())
    }

    fn is_recording(&self) -> bool {
        false
    }
}
