//! Session object tying playback, beat detection and rendering together.

use serde::Serialize;

use crate::{
    render::{ColorMode, RenderMode, StereoFieldRenderer, Surface},
    AnalysisWindow, AppConfig, AudioEngine, BeatDetector, Clock, DecodedBuffer, Decoder,
    OutputDevice, PlaybackState, Result,
};

/// Outcome of one [`Player::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameReport {
    pub position: f64,
    pub duration: f64,
    pub state: PlaybackState,
    pub beat: bool,
    /// Whether anything was drawn; frames are only drawn while playing.
    pub rendered: bool,
    /// Set on the tick that ran into the end of the track.
    pub ended: bool,
    pub points: usize,
    pub particles: usize,
}

/// A playback session with its visualisation. Constructed explicitly and
/// handed to whatever drives frames and input events.
#[derive(Debug)]
pub struct Player<C, D> {
    engine: AudioEngine<C, D>,
    beat: BeatDetector,
    renderer: StereoFieldRenderer,
    window: AnalysisWindow,
    last_volume: f32,
    skip_seconds: f64,
}

impl<C: Clock, D: OutputDevice> Player<C, D> {
    pub fn new<S: Surface + ?Sized>(config: &AppConfig, clock: C, device: D, surface: &mut S) -> Result<Self> {
        config.validate()?;
        let renderer = StereoFieldRenderer::new(&config.visual, surface);
        Self::assemble(config, clock, device, renderer)
    }

    /// Same as [`new`](Self::new) with a fixed particle seed.
    pub fn with_seed<S: Surface + ?Sized>(
        config: &AppConfig,
        clock: C,
        device: D,
        surface: &mut S,
        seed: u64,
    ) -> Result<Self> {
        config.validate()?;
        let renderer = StereoFieldRenderer::with_seed(&config.visual, surface, seed);
        Self::assemble(config, clock, device, renderer)
    }

    fn assemble(config: &AppConfig, clock: C, device: D, renderer: StereoFieldRenderer) -> Result<Self> {
        let engine = AudioEngine::new(
            clock,
            device,
            config.analysis.window_size,
            config.transport.initial_volume,
        )?;

        Ok(Self {
            engine,
            beat: BeatDetector::new(&config.beat),
            renderer,
            window: AnalysisWindow::silent(config.analysis.window_size),
            last_volume: 1.0,
            skip_seconds: config.transport.skip_seconds,
        })
    }

    /// Advances one frame: handles the end of the track, then, while
    /// playing, samples the current windows, runs beat detection and draws.
    pub fn tick<S: Surface + ?Sized>(&mut self, surface: &mut S) -> Result<FrameReport> {
        let ended = self.engine.finish_if_ended()?;

        let mut report = FrameReport {
            position: self.engine.current_position(),
            duration: self.engine.duration(),
            state: self.engine.state(),
            beat: false,
            rendered: false,
            ended,
            points: 0,
            particles: self.renderer.particles().len(),
        };
        if !self.engine.is_playing() {
            return Ok(report);
        }

        self.engine.capture_windows(&mut self.window);
        report.beat = self.beat.detect(&self.window.left, &self.window.right);
        if report.beat {
            tracing::trace!(position = report.position, "beat");
        }

        let stats = self
            .renderer
            .render(surface, &self.window.left, &self.window.right);
        report.rendered = true;
        report.points = stats.points;
        report.particles = stats.particles;
        Ok(report)
    }

    pub fn load(&mut self, decoder: &impl Decoder, raw: Vec<u8>) -> Result<()> {
        self.engine.load(decoder, raw)
    }

    pub fn load_buffer(&mut self, buffer: DecodedBuffer) -> Result<()> {
        self.engine.load_buffer(buffer)
    }

    pub fn play(&mut self) -> Result<()> {
        self.engine.play()
    }

    pub fn pause(&mut self) -> Result<()> {
        self.engine.pause()
    }

    pub fn stop(&mut self) -> Result<()> {
        self.engine.stop()
    }

    /// Returns whether the session is playing afterwards.
    pub fn toggle_playback(&mut self) -> Result<bool> {
        if self.engine.is_playing() {
            self.engine.pause()?;
        } else {
            self.engine.play()?;
        }
        Ok(self.engine.is_playing())
    }

    pub fn seek(&mut self, target_seconds: f64) -> Result<()> {
        self.engine.seek(target_seconds)
    }

    pub fn skip_forward(&mut self) -> Result<()> {
        let target = self.engine.current_position() + self.skip_seconds;
        self.engine.seek(target)
    }

    pub fn skip_backward(&mut self) -> Result<()> {
        let target = self.engine.current_position() - self.skip_seconds;
        self.engine.seek(target)
    }

    pub fn set_volume(&mut self, volume: f32) -> Result<()> {
        self.engine.set_volume(volume)
    }

    /// Mutes, remembering the current volume, or restores the remembered
    /// volume when already silent. Returns the new volume.
    pub fn toggle_mute(&mut self) -> Result<f32> {
        let current = self.engine.volume();
        if current > 0.0 {
            self.engine.set_volume(0.0)?;
            self.last_volume = current;
        } else {
            self.engine.set_volume(self.last_volume)?;
        }
        Ok(self.engine.volume())
    }

    pub fn set_color_mode(&mut self, mode: ColorMode) {
        self.renderer.set_color_mode(mode);
    }

    pub fn cycle_color_mode(&mut self) -> ColorMode {
        self.renderer.cycle_color_mode()
    }

    pub fn set_render_mode(&mut self, mode: RenderMode) {
        self.renderer.set_render_mode(mode);
    }

    pub fn set_particle_mode(&mut self, enabled: bool) {
        self.renderer.set_particle_mode(enabled);
    }

    pub fn toggle_particles(&mut self) -> bool {
        let enabled = !self.renderer.particles_enabled();
        self.renderer.set_particle_mode(enabled);
        enabled
    }

    pub fn set_beat_detection(&mut self, enabled: bool) {
        self.beat.set_enabled(enabled);
    }

    pub fn on_resize<S: Surface + ?Sized>(&mut self, surface: &mut S) -> bool {
        self.renderer.on_resize(surface)
    }

    pub fn engine(&self) -> &AudioEngine<C, D> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut AudioEngine<C, D> {
        &mut self.engine
    }

    pub fn renderer(&self) -> &StereoFieldRenderer {
        &self.renderer
    }

    pub fn beat_detector(&self) -> &BeatDetector {
        &self.beat
    }
}
