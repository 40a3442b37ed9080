use std::sync::Arc;

use crate::{
    AnalysisWindow, ChannelAnalyzer, Clock, GonioError, PlaybackState, Result, SpectrumWindow,
    TransportClock,
};

mod buffer;
mod decode;
mod output;

pub use buffer::DecodedBuffer;
pub use decode::{Decoder, SymphoniaDecoder};
pub use output::{HeadlessOutput, OutputDevice};

/// Playback session: owns the loaded track, drives the output device and
/// answers transport and analysis queries.
///
/// Transport calls on a session without a track succeed and do nothing.
#[derive(Debug)]
pub struct AudioEngine<C, D> {
    clock: C,
    device: D,
    transport: TransportClock,
    buffer: Option<Arc<DecodedBuffer>>,
    volume: f32,
    analyzer: ChannelAnalyzer,
}

impl<C: Clock, D: OutputDevice> AudioEngine<C, D> {
    /// Brings up the output device at `volume`. A device that refuses its
    /// initial gain is reported as [`GonioError::Initialization`].
    pub fn new(clock: C, mut device: D, window_size: usize, volume: f32) -> Result<Self> {
        let volume = sanitize_volume(volume);
        device
            .set_gain(volume)
            .map_err(|err| GonioError::Initialization(err.to_string()))?;

        Ok(Self {
            clock,
            device,
            transport: TransportClock::new(),
            buffer: None,
            volume,
            analyzer: ChannelAnalyzer::new(window_size)?,
        })
    }

    /// Decodes `raw` and makes it the current track. On failure the previous
    /// track, position and state are left untouched.
    pub fn load(&mut self, decoder: &impl Decoder, raw: Vec<u8>) -> Result<()> {
        match decoder.decode(raw) {
            Ok(buffer) => self.load_buffer(buffer),
            Err(err) => {
                tracing::warn!(error = %err, "rejected track, keeping current one");
                Err(err)
            }
        }
    }

    /// Replaces the current track. Any running output is stopped and the
    /// session returns to `Idle` at position zero.
    pub fn load_buffer(&mut self, buffer: DecodedBuffer) -> Result<()> {
        if self.transport.is_playing() {
            self.device.stop()?;
        }

        tracing::info!(
            duration = buffer.duration_seconds(),
            sample_rate = buffer.sample_rate(),
            "track loaded"
        );
        self.transport.load(buffer.duration_seconds());
        self.buffer = Some(Arc::new(buffer));
        Ok(())
    }

    /// Stops output and drops the current track.
    pub fn eject(&mut self) -> Result<()> {
        if self.transport.is_playing() {
            self.device.stop()?;
        }
        self.transport = TransportClock::new();
        self.buffer = None;
        Ok(())
    }

    pub fn play(&mut self) -> Result<()> {
        let Some(buffer) = &self.buffer else {
            return Ok(());
        };
        if self.transport.is_playing() {
            return Ok(());
        }

        self.device.resume_if_suspended()?;
        let offset = self.transport.resume_offset();
        self.device.start(buffer, offset)?;
        self.transport.start(self.clock.now());
        tracing::debug!(offset, "playback started");
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        if !self.transport.is_playing() {
            return Ok(());
        }

        let now = self.clock.now();
        self.device.stop()?;
        if let Some(offset) = self.transport.pause(now) {
            tracing::debug!(offset, "playback paused");
        }
        Ok(())
    }

    /// Stops output and rewinds to the start, leaving the track loaded.
    pub fn stop(&mut self) -> Result<()> {
        if self.transport.is_playing() {
            self.device.stop()?;
        }
        let duration = self.transport.duration();
        if self.transport.is_loaded() {
            self.transport.load(duration);
        }
        Ok(())
    }

    /// Moves to `target_seconds`, clamped into `[0, duration]`. A playing
    /// session restarts the output at the new offset and stays playing; both
    /// halves use a single clock reading.
    pub fn seek(&mut self, target_seconds: f64) -> Result<()> {
        let Some(buffer) = self.buffer.clone() else {
            return Ok(());
        };

        let now = self.clock.now();
        if !self.transport.is_playing() {
            self.transport.seek(target_seconds, now);
            return Ok(());
        }

        self.device.stop()?;
        let offset = self.transport.seek(target_seconds, now).unwrap_or(0.0);
        let restarted = self
            .device
            .resume_if_suspended()
            .and_then(|()| self.device.start(&buffer, offset));
        if let Err(err) = restarted {
            self.transport.pause(now);
            return Err(err);
        }
        tracing::debug!(offset, "seek while playing");
        Ok(())
    }

    /// Pauses at the end of the track once the position reaches the
    /// duration. Returns whether this call ended playback.
    pub fn finish_if_ended(&mut self) -> Result<bool> {
        if !self.transport.is_playing() {
            return Ok(false);
        }

        let duration = self.transport.duration();
        if self.transport.position(self.clock.now()) < duration {
            return Ok(false);
        }

        self.device.stop()?;
        self.transport.finish();
        tracing::debug!(duration, "track finished");
        Ok(true)
    }

    pub fn current_position(&self) -> f64 {
        self.transport.position(self.clock.now())
    }

    pub fn duration(&self) -> f64 {
        self.transport.duration()
    }

    pub fn state(&self) -> PlaybackState {
        self.transport.state()
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }

    pub fn has_track(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn has_ended(&self) -> bool {
        self.transport.has_ended()
    }

    /// Sets the output gain. Values are clamped to `[0, 1]`; NaN reads as 0.
    pub fn set_volume(&mut self, volume: f32) -> Result<()> {
        let volume = sanitize_volume(volume);
        self.device.set_gain(volume)?;
        self.volume = volume;
        Ok(())
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Current time-domain windows. The tap sits after the gain stage, so
    /// the samples carry the current volume. Silent without a track.
    pub fn analysis_windows(&self) -> AnalysisWindow {
        let mut window = AnalysisWindow::default();
        self.capture_windows(&mut window);
        window
    }

    /// Allocation-free variant of [`analysis_windows`](Self::analysis_windows).
    pub fn capture_windows(&self, out: &mut AnalysisWindow) {
        match &self.buffer {
            Some(buffer) => {
                self.analyzer
                    .capture(buffer, self.current_position(), self.volume, out)
            }
            None => {
                let size = self.analyzer.window_size();
                out.left.clear();
                out.left.resize(size, 0.0);
                out.right.clear();
                out.right.resize(size, 0.0);
            }
        }
    }

    /// Magnitude spectra for the current position.
    pub fn frequency_windows(&mut self) -> Result<SpectrumWindow> {
        let position = self.current_position();
        match &self.buffer {
            Some(buffer) => self.analyzer.spectrum(buffer, position, self.volume),
            None => {
                let bins = self.analyzer.window_size() / 2 + 1;
                Ok(SpectrumWindow {
                    left: vec![0.0; bins],
                    right: vec![0.0; bins],
                    bin_hz: 0.0,
                })
            }
        }
    }

    pub fn buffer(&self) -> Option<&DecodedBuffer> {
        self.buffer.as_deref()
    }

    pub fn window_size(&self) -> usize {
        self.analyzer.window_size()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }
}

fn sanitize_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ManualClock;

    type TestEngine = AudioEngine<ManualClock, HeadlessOutput>;

    fn engine() -> (TestEngine, ManualClock) {
        let clock = ManualClock::new();
        let engine = AudioEngine::new(clock.clone(), HeadlessOutput::suspended(), 64, 1.0).unwrap();
        (engine, clock)
    }

    fn constant_buffer(seconds: usize, amplitude: f32) -> DecodedBuffer {
        DecodedBuffer::from_channels(1_000, vec![vec![amplitude; seconds * 1_000]]).unwrap()
    }

    #[derive(Debug)]
    struct BrokenOutput;

    impl OutputDevice for BrokenOutput {
        fn start(&mut self, _: &Arc<DecodedBuffer>, _: f64) -> Result<()> {
            Err(GonioError::Output("device lost".into()))
        }

        fn stop(&mut self) -> Result<()> {
            Ok(())
        }

        fn resume_if_suspended(&mut self) -> Result<()> {
            Ok(())
        }

        fn set_gain(&mut self, _: f32) -> Result<()> {
            Err(GonioError::Output("no gain stage".into()))
        }
    }

    struct FailingDecoder;

    impl Decoder for FailingDecoder {
        fn decode(&self, _: Vec<u8>) -> Result<DecodedBuffer> {
            Err(GonioError::Decode("corrupt".into()))
        }
    }

    #[test]
    fn empty_session_ignores_transport() {
        let (mut engine, clock) = engine();
        engine.play().unwrap();
        engine.pause().unwrap();
        engine.seek(3.0).unwrap();
        clock.advance(1.0);

        assert_eq!(engine.state(), PlaybackState::Idle);
        assert_eq!(engine.duration(), 0.0);
        assert_eq!(engine.current_position(), 0.0);
        assert_eq!(engine.device().start_count(), 0);
        assert_eq!(engine.analysis_windows(), AnalysisWindow::silent(64));
    }

    #[test]
    fn unavailable_device_fails_initialization() {
        let err = AudioEngine::new(ManualClock::new(), BrokenOutput, 64, 1.0).unwrap_err();
        assert!(matches!(err, GonioError::Initialization(_)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn doubled_mono_track_reports_duration_and_clamps_seek() {
        let (mut engine, _clock) = engine();
        engine.load_buffer(constant_buffer(2, 0.5)).unwrap();

        assert!((engine.duration() - 2.0).abs() < 1e-9);
        engine.seek(10.0).unwrap();
        assert_eq!(engine.current_position(), 2.0);
        engine.seek(-5.0).unwrap();
        assert_eq!(engine.current_position(), 0.0);
    }

    #[test]
    fn play_resumes_device_and_starts_at_offset() {
        let (mut engine, clock) = engine();
        engine.load_buffer(constant_buffer(30, 0.5)).unwrap();
        engine.seek(5.0).unwrap();
        engine.play().unwrap();

        assert!(!engine.device().is_suspended());
        assert!(engine.device().is_running());
        assert_eq!(engine.device().last_offset(), 5.0);

        clock.advance(1.25);
        assert_eq!(engine.current_position(), 6.25);
    }

    #[test]
    fn play_pause_play_is_continuous() {
        let (mut engine, clock) = engine();
        engine.load_buffer(constant_buffer(30, 0.5)).unwrap();
        engine.seek(5.0).unwrap();
        engine.play().unwrap();

        let mut last = engine.current_position();
        for step in 0..10 {
            clock.advance(0.1);
            match step {
                3 => engine.pause().unwrap(),
                4 => engine.pause().unwrap(),
                6 => engine.play().unwrap(),
                _ => {}
            }
            let now = engine.current_position();
            assert!(now >= last, "position went backwards: {last} -> {now}");
            last = now;
        }
        assert!(engine.is_playing());
    }

    #[test]
    fn double_pause_changes_nothing() {
        let (mut engine, clock) = engine();
        engine.load_buffer(constant_buffer(30, 0.5)).unwrap();
        engine.play().unwrap();
        clock.advance(2.0);
        engine.pause().unwrap();
        let paused_at = engine.current_position();

        clock.advance(3.0);
        engine.pause().unwrap();
        assert_eq!(engine.current_position(), paused_at);
        assert_eq!(engine.state(), PlaybackState::Paused);
    }

    #[test]
    fn seek_while_playing_restarts_output() {
        let (mut engine, clock) = engine();
        engine.load_buffer(constant_buffer(30, 0.5)).unwrap();
        engine.play().unwrap();
        clock.advance(1.0);
        engine.seek(12.0).unwrap();

        assert!(engine.is_playing());
        assert_eq!(engine.device().start_count(), 2);
        assert_eq!(engine.device().last_offset(), 12.0);
        assert_eq!(engine.current_position(), 12.0);
    }

    #[test]
    fn seek_while_playing_resumes_suspended_device() {
        let (mut engine, clock) = engine();
        engine.load_buffer(constant_buffer(30, 0.5)).unwrap();
        engine.play().unwrap();
        clock.advance(1.0);

        engine.device_mut().suspend();
        engine.seek(5.0).unwrap();

        assert!(!engine.device().is_suspended());
        assert!(engine.device().is_running());
        assert!(engine.is_playing());
    }

    #[test]
    fn volume_round_trips_and_reaches_device() {
        let (mut engine, _clock) = engine();
        for volume in [0.0, 0.25, 0.5, 1.0] {
            engine.set_volume(volume).unwrap();
            assert_eq!(engine.volume(), volume);
            assert_eq!(engine.device().gain(), volume);
        }
        engine.set_volume(3.0).unwrap();
        assert_eq!(engine.volume(), 1.0);
    }

    #[test]
    fn windows_follow_position_and_gain() {
        let (mut engine, clock) = engine();
        engine.load_buffer(constant_buffer(2, 0.5)).unwrap();
        engine.set_volume(0.5).unwrap();
        engine.play().unwrap();

        let start = engine.analysis_windows();
        assert!(start.left.iter().all(|s| *s == 0.0));

        clock.advance(1.0);
        let window = engine.analysis_windows();
        assert_eq!(window.len(), 64);
        assert!(window.left.iter().all(|s| *s == 0.25));
        assert_eq!(window.left, window.right);
    }

    #[test]
    fn failed_decode_keeps_previous_track() {
        let (mut engine, clock) = engine();
        engine.load_buffer(constant_buffer(3, 0.5)).unwrap();
        engine.play().unwrap();
        clock.advance(1.0);

        let err = engine.load(&FailingDecoder, b"junk".to_vec()).unwrap_err();
        assert!(matches!(err, GonioError::Decode(_)));
        assert!(engine.is_playing());
        assert!((engine.duration() - 3.0).abs() < 1e-9);
        assert_eq!(engine.current_position(), 1.0);
    }

    #[test]
    fn loading_a_new_track_resets_transport() {
        let (mut engine, clock) = engine();
        engine.load_buffer(constant_buffer(3, 0.5)).unwrap();
        engine.play().unwrap();
        clock.advance(1.0);

        engine.load_buffer(constant_buffer(5, 0.1)).unwrap();
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert_eq!(engine.current_position(), 0.0);
        assert!(!engine.device().is_running());
    }

    #[test]
    fn finishes_at_end_and_restarts_from_zero() {
        let (mut engine, clock) = engine();
        engine.load_buffer(constant_buffer(2, 0.5)).unwrap();
        engine.play().unwrap();
        clock.advance(1.0);
        assert!(!engine.finish_if_ended().unwrap());

        clock.advance(1.5);
        assert!(engine.finish_if_ended().unwrap());
        assert_eq!(engine.state(), PlaybackState::Paused);
        assert_eq!(engine.current_position(), 2.0);
        assert!(!engine.device().is_running());

        engine.play().unwrap();
        assert_eq!(engine.device().last_offset(), 0.0);
        assert_eq!(engine.current_position(), 0.0);
    }

    #[test]
    fn failed_restart_after_seek_leaves_session_paused() {
        let clock = ManualClock::new();
        let mut engine = AudioEngine::new(clock.clone(), HeadlessOutput::new(), 64, 1.0).unwrap();
        engine.load_buffer(constant_buffer(10, 0.5)).unwrap();
        engine.play().unwrap();
        clock.advance(1.0);

        // Swap in a device that fails to start again.
        let mut broken = AudioEngine {
            clock: engine.clock.clone(),
            device: BrokenOutput,
            transport: engine.transport.clone(),
            buffer: engine.buffer.clone(),
            volume: engine.volume,
            analyzer: ChannelAnalyzer::new(64).unwrap(),
        };
        assert!(broken.seek(4.0).is_err());
        assert_eq!(broken.state(), PlaybackState::Paused);
        assert_eq!(broken.current_position(), 4.0);
    }

    #[test]
    fn eject_drops_the_track() {
        let (mut engine, _clock) = engine();
        engine.load_buffer(constant_buffer(2, 0.5)).unwrap();
        engine.play().unwrap();
        engine.eject().unwrap();

        assert!(!engine.has_track());
        assert_eq!(engine.duration(), 0.0);
        assert!(!engine.device().is_running());
    }

    #[test]
    fn spectrum_has_expected_bin_count() {
        let (mut engine, clock) = engine();
        engine.load_buffer(constant_buffer(2, 0.5)).unwrap();
        engine.play().unwrap();
        clock.advance(0.5);

        let spectrum = engine.frequency_windows().unwrap();
        assert_eq!(spectrum.left.len(), 33);
        assert!(spectrum.left[0] > 0.0);
    }
}
