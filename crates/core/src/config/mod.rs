use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    render::{ColorMode, RenderMode, Rgb},
    GonioError, Result,
};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub analysis: AnalysisConfig,
    pub beat: BeatConfig,
    pub visual: VisualConfig,
    pub transport: TransportConfig,
}

impl AppConfig {
    /// Parses a (possibly partial) JSON document. Missing fields fall back to
    /// their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: AppConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loading configuration");
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        let window = self.analysis.window_size;
        if window < 32 || !window.is_power_of_two() {
            return Err(invalid(format!(
                "analysis window must be a power of two >= 32, got {window}"
            )));
        }

        if !(0.0..=1.0).contains(&self.beat.decay) {
            return Err(invalid(format!(
                "beat decay must lie in [0, 1], got {}",
                self.beat.decay
            )));
        }
        if self.beat.threshold < 0.0 {
            return Err(invalid("beat threshold must not be negative"));
        }

        let visual = &self.visual;
        if !(0.0..1.0).contains(&visual.persistence) {
            return Err(invalid(format!(
                "persistence must lie in [0, 1), got {}",
                visual.persistence
            )));
        }
        if visual.dot_stride == 0 || visual.line_stride == 0 {
            return Err(invalid("sample strides must be at least 1"));
        }
        if visual.scale_fraction <= 0.0 {
            return Err(invalid("scale fraction must be positive"));
        }
        if visual.particle_speed_min > visual.particle_speed_max {
            return Err(invalid("particle speed range is inverted"));
        }
        if visual.particle_life == 0 {
            return Err(invalid("particle life must be at least one frame"));
        }

        if !(0.0..=1.0).contains(&self.transport.initial_volume) {
            return Err(invalid(format!(
                "initial volume must lie in [0, 1], got {}",
                self.transport.initial_volume
            )));
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> GonioError {
    GonioError::InvalidConfig(message.into())
}

/// Configuration of the channel analyser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Samples per channel in each analysis window.
    pub window_size: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self { window_size: 2048 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeatConfig {
    pub enabled: bool,
    /// Multiple of the energy baseline a frame must exceed to count as a beat.
    pub threshold: f32,
    /// Per-frame retention of the energy baseline.
    pub decay: f32,
    /// Frames suppressed after each detected beat.
    pub hold_frames: u32,
}

impl Default for BeatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.15,
            decay: 0.98,
            hold_frames: 60,
        }
    }
}

/// Stereo field renderer and particle settings. Every per-frame constant here
/// is applied once per rendered frame, not per second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualConfig {
    pub persistence: f32,
    pub point_size: f32,
    pub scale_fraction: f32,
    pub static_color: Rgb,
    pub gradient_start_hue: f32,
    pub gradient_hue_step: f32,
    pub dot_stride: usize,
    pub line_stride: usize,
    pub line_width: f32,
    pub color_mode: ColorMode,
    pub render_mode: RenderMode,
    pub particles_enabled: bool,
    pub max_particles: usize,
    pub particle_spawn_chance: f32,
    pub particle_life: u32,
    pub particle_speed_min: f32,
    pub particle_speed_max: f32,
    pub particle_size_factor: f32,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            persistence: 0.5,
            point_size: 2.0,
            scale_fraction: 0.4,
            static_color: Rgb::GREEN,
            gradient_start_hue: 120.0,
            gradient_hue_step: 0.1,
            dot_stride: 1,
            line_stride: 4,
            line_width: 1.0,
            color_mode: ColorMode::Static,
            render_mode: RenderMode::Dots,
            particles_enabled: false,
            max_particles: 100,
            particle_spawn_chance: 0.1,
            particle_life: 100,
            particle_speed_min: 0.5,
            particle_speed_max: 1.5,
            particle_size_factor: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub initial_volume: f32,
    /// Distance covered by the skip forward/backward controls.
    pub skip_seconds: f64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            initial_volume: 1.0,
            skip_seconds: 10.0,
        }
    }
}
