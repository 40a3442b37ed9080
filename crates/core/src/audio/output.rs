use std::sync::Arc;

use crate::{DecodedBuffer, Result};

/// Sink that actually plays the decoded buffer. It runs on its own execution
/// context; the session only ever talks to it through these calls.
pub trait OutputDevice {
    /// Begins playing `buffer` from `offset_seconds`.
    fn start(&mut self, buffer: &Arc<DecodedBuffer>, offset_seconds: f64) -> Result<()>;
    /// Stops playback. Must be safe to call when nothing is playing.
    fn stop(&mut self) -> Result<()>;
    fn resume_if_suspended(&mut self) -> Result<()>;
    fn set_gain(&mut self, value: f32) -> Result<()>;
}

/// Output that produces no sound. Used for offline rendering and tests; it
/// keeps just enough state to observe what the session asked of it.
#[derive(Debug, Default)]
pub struct HeadlessOutput {
    buffer: Option<Arc<DecodedBuffer>>,
    offset_seconds: f64,
    gain: f32,
    suspended: bool,
    starts: usize,
}

impl HeadlessOutput {
    pub fn new() -> Self {
        Self {
            gain: 1.0,
            ..Self::default()
        }
    }

    /// Starts out suspended, like an output context created before any user
    /// gesture.
    pub fn suspended() -> Self {
        Self {
            suspended: true,
            ..Self::new()
        }
    }

    /// Simulates the host suspending the output context (for example when
    /// the application is backgrounded).
    pub fn suspend(&mut self) {
        self.suspended = true;
    }

    pub fn is_running(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Offset passed to the most recent `start`.
    pub fn last_offset(&self) -> f64 {
        self.offset_seconds
    }

    pub fn start_count(&self) -> usize {
        self.starts
    }
}

impl OutputDevice for HeadlessOutput {
    fn start(&mut self, buffer: &Arc<DecodedBuffer>, offset_seconds: f64) -> Result<()> {
        self.buffer = Some(Arc::clone(buffer));
        self.offset_seconds = offset_seconds;
        self.starts += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.buffer = None;
        Ok(())
    }

    fn resume_if_suspended(&mut self) -> Result<()> {
        self.suspended = false;
        Ok(())
    }

    fn set_gain(&mut self, value: f32) -> Result<()> {
        self.gain = value;
        Ok(())
    }
}
