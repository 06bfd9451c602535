//! Scripted frame source for tests and demos.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::FrameSource;
use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;

#[derive(Default)]
struct Script {
    queue: VecDeque<MediaResult<Frame>>,
    connected: bool,
    reconnect_succeeds: bool,
    reconnect_attempts: u32,
    reads: u32,
    closed: bool,
}

/// Frame source driven from the outside.
///
/// Clones share the same script, so a test can keep one clone and hand the
/// other to the coordinator. Queued errors disconnect the source, as a
/// lost device would.
#[derive(Clone)]
pub struct ScriptedSource {
    name: String,
    script: Arc<Mutex<Script>>,
}

impl ScriptedSource {
    /// A connected source with an empty queue.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Arc::new(Mutex::new(Script {
                connected: true,
                ..Script::default()
            })),
        }
    }

    /// A source whose device is absent; reconnects fail until
    /// [`set_reconnect_succeeds`](Self::set_reconnect_succeeds).
    pub fn disconnected(name: impl Into<String>) -> Self {
        let source = Self::new(name);
        source.set_connected(false);
        source
    }

    pub fn push_frame(&self, frame: Frame) {
        self.script.lock().queue.push_back(Ok(frame));
    }

    /// Queue a solid frame with the next sequence number.
    pub fn push_filled(&self, width: u32, height: u32, color: [u8; 3]) {
        let mut script = self.script.lock();
        let seq = script.queue.len() as u64 + script.reads as u64 + 1;
        script
            .queue
            .push_back(Ok(Frame::filled(width, height, color, seq)));
    }

    pub fn push_error(&self, message: &str) {
        self.script
            .lock()
            .queue
            .push_back(Err(MediaError::device_unavailable(message)));
    }

    pub fn set_connected(&self, connected: bool) {
        self.script.lock().connected = connected;
    }

    pub fn set_reconnect_succeeds(&self, succeeds: bool) {
        self.script.lock().reconnect_succeeds = succeeds;
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.script.lock().reconnect_attempts
    }

    /// Number of `read_frame` calls made while connected.
    pub fn reads(&self) -> u32 {
        self.script.lock().reads
    }

    pub fn pending(&self) -> usize {
        self.script.lock().queue.len()
    }

    pub fn is_closed(&self) -> bool {
        self.script.lock().closed
    }
}

impl FrameSource for ScriptedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.script.lock().connected
    }

    fn read_frame(&mut self) -> MediaResult<Option<Frame>> {
        let mut script = self.script.lock();
        if !script.connected {
            return Err(MediaError::device_unavailable(format!(
                "{} is disconnected",
                self.name
            )));
        }
        script.reads += 1;
        match script.queue.pop_front() {
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(e)) => {
                script.connected = false;
                Err(e)
            }
            None => Ok(None),
        }
    }

    fn reconnect(&mut self) -> MediaResult<()> {
        let mut script = self.script.lock();
        script.reconnect_attempts += 1;
        if script.reconnect_succeeds {
            script.connected = true;
            Ok(())
        } else {
            Err(MediaError::device_unavailable(format!(
                "{} did not reopen",
                self.name
            )))
        }
    }

    fn close(&mut self) {
        let mut script = self.script.lock();
        script.connected = false;
        script.closed = true;
    }
}
