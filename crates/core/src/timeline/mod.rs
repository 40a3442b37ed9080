//! Reference clocks and the transport arithmetic built on top of them.
//!
//! [`TransportClock`] never reads a clock itself: every mutating call takes
//! the current reading, which keeps it a plain state machine that tests can
//! drive with exact numbers.

use std::{cell::Cell, rc::Rc, time::Instant};

use serde::{Deserialize, Serialize};

/// Monotonically non-decreasing time source measured in seconds.
pub trait Clock {
    fn now(&self) -> f64;
}

/// Wall clock backed by [`Instant`], starting at zero on construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Externally stepped clock. Clones share the same reading, so a host (or a
/// test) can keep one handle and advance the time observed by the session.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    seconds: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward. Negative steps are ignored.
    pub fn advance(&self, delta_seconds: f64) {
        if delta_seconds > 0.0 {
            self.seconds.set(self.seconds.get() + delta_seconds);
        }
    }

    /// Jumps to `seconds` unless that would move the clock backwards.
    pub fn set(&self, seconds: f64) {
        if seconds > self.seconds.get() {
            self.seconds.set(seconds);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.seconds.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
    Paused,
}

/// Play/pause/seek bookkeeping for one loaded track.
///
/// While playing, position is the offset the run started from plus the time
/// elapsed since the run started (equivalently `now - reference_start()`).
/// Otherwise it is the offset captured by the last pause or seek. Reads are
/// always clamped to `[0, duration]`.
#[derive(Debug, Clone, Default)]
pub struct TransportClock {
    state: PlaybackState,
    loaded: bool,
    duration: f64,
    run_started_at: f64,
    paused_offset: f64,
    ended: bool,
}

impl TransportClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the transport for a freshly loaded track of `duration` seconds.
    pub fn load(&mut self, duration: f64) {
        *self = Self {
            loaded: true,
            duration: duration.max(0.0),
            ..Self::default()
        };
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn duration(&self) -> f64 {
        if self.loaded {
            self.duration
        } else {
            0.0
        }
    }

    /// True once the track played through to its end and has not been
    /// restarted or sought since.
    pub fn has_ended(&self) -> bool {
        self.ended
    }

    /// Offset the output should start from on the next [`start`](Self::start).
    pub fn resume_offset(&self) -> f64 {
        if self.ended {
            0.0
        } else {
            self.clamp(self.paused_offset)
        }
    }

    /// Enters `Playing`. Returns `false` when nothing changed (no track, or
    /// already playing).
    pub fn start(&mut self, now: f64) -> bool {
        if !self.loaded || self.is_playing() {
            return false;
        }

        self.paused_offset = self.resume_offset();
        self.ended = false;
        self.run_started_at = now;
        self.state = PlaybackState::Playing;
        true
    }

    /// Captures the current position and enters `Paused`. Returns `None` when
    /// not playing.
    pub fn pause(&mut self, now: f64) -> Option<f64> {
        if !self.is_playing() {
            return None;
        }

        self.paused_offset = self.elapsed_position(now);
        self.state = PlaybackState::Paused;
        Some(self.paused_offset)
    }

    /// Moves the position to `target` clamped into `[0, duration]`. A playing
    /// transport stays playing from the new offset. Returns the clamped target,
    /// or `None` without a track.
    pub fn seek(&mut self, target: f64, now: f64) -> Option<f64> {
        if !self.loaded {
            return None;
        }

        let offset = if target.is_nan() { 0.0 } else { self.clamp(target) };
        self.paused_offset = offset;
        self.ended = false;
        if self.is_playing() {
            self.run_started_at = now;
        }
        Some(offset)
    }

    /// Marks the track as played through: `Paused` at `duration`.
    pub fn finish(&mut self) {
        if !self.loaded {
            return;
        }
        self.paused_offset = self.duration;
        self.state = PlaybackState::Paused;
        self.ended = true;
    }

    pub fn position(&self, now: f64) -> f64 {
        if !self.loaded {
            return 0.0;
        }

        match self.state {
            PlaybackState::Playing => self.elapsed_position(now),
            PlaybackState::Idle | PlaybackState::Paused => self.clamp(self.paused_offset),
        }
    }

    /// Clock reading that corresponds to position zero of the current run.
    pub fn reference_start(&self) -> f64 {
        self.run_started_at - self.paused_offset
    }

    fn elapsed_position(&self, now: f64) -> f64 {
        self.clamp(self.paused_offset + (now - self.run_started_at).max(0.0))
    }

    fn clamp(&self, seconds: f64) -> f64 {
        seconds.clamp(0.0, self.duration)
    }
}

/// Formats seconds as `M:SS`. NaN and negative values read as zero.
pub fn format_time(seconds: f64) -> String {
    let seconds = if seconds.is_nan() || seconds < 0.0 {
        0.0
    } else {
        seconds
    };
    let whole = seconds.floor() as u64;
    format!("{}:{:02}", whole / 60, whole % 60)
}
