//! In-memory recorder for tests.

use std::sync::Arc;

use parking_lot::Mutex;

use super::Recorder;
use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;

#[derive(Default)]
struct Tape {
    seqs: Vec<u64>,
    fail_writes: bool,
    stopped: bool,
}

/// Records frame sequence numbers. Clones share the tape.
#[derive(Clone, Default)]
pub struct MemoryRecorder {
    tape: Arc<Mutex<Tape>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence numbers of every frame written so far.
    pub fn written(&self) -> Vec<u64> {
        self.tape.lock().seqs.clone()
    }

    pub fn frames_written(&self) -> usize {
        self.tape.lock().seqs.len()
    }

    /// Make every following write fail.
    pub fn fail_writes(&self) {
        self.tape.lock().fail_writes = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.tape.lock().stopped
    }
}

impl Recorder for MemoryRecorder {
    fn write(&mut self, frame: &Frame) -> MediaResult<()> {
        let mut tape = self.tape.lock();
        if tape.fail_writes {
            return Err(MediaError::recorder_failed("disk full"));
        }
        if tape.stopped {
            return Err(MediaError::recorder_failed("recorder stopped"));
        }
        tape.seqs.push(frame.seq());
        Ok(())
    }

    fn stop(&mut self) -> MediaResult<()> {
        self.tape.lock().stopped = true;
        Ok(())
    }

    fn is_recording(&self) -> bool {
        let tape = self.tape.lock();
        !tape.stopped && !tape.fail_writes
    }
}
