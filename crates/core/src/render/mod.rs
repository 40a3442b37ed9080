//! Goniometer (stereo phase) renderer.
//!
//! Each frame takes a left/right window pair, normalises it with a slowly
//! adapting gain and plots every sample pair on the mid/side diagonals:
//! mono content runs vertically, out-of-phase content horizontally.

use std::{fmt, str::FromStr};

use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{config::VisualConfig, GonioError};

pub mod color;
pub mod particles;
pub mod surface;

pub use color::{Rgb, Rgba};
pub use particles::{Particle, ParticleSystem};
pub use surface::{DrawCommand, DrawList, Framebuffer, Point, Surface};

/// Peak level below which a window counts as silence.
const AMPLITUDE_FLOOR: f32 = 0.01;
/// Peak level the normalisation steers towards.
const NORMALIZATION_TARGET: f32 = 0.7;
/// Per-frame retention of the previous normalisation factor.
const NORMALIZATION_SMOOTHING: f32 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Every point uses the configured colour.
    #[default]
    Static,
    /// One hue for all points, advancing a little every frame.
    Gradient,
    /// Hue follows each point's distance from the centre.
    Spectrum,
}

impl ColorMode {
    /// Static, gradient, spectrum, then back to static.
    pub fn next(self) -> Self {
        match self {
            ColorMode::Static => ColorMode::Gradient,
            ColorMode::Gradient => ColorMode::Spectrum,
            ColorMode::Spectrum => ColorMode::Static,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColorMode::Static => "static",
            ColorMode::Gradient => "gradient",
            ColorMode::Spectrum => "spectrum",
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColorMode {
    type Err = GonioError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "static" => Ok(ColorMode::Static),
            "gradient" => Ok(ColorMode::Gradient),
            "spectrum" => Ok(ColorMode::Spectrum),
            other => Err(GonioError::InvalidConfig(format!("unknown color mode `{other}`"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    #[default]
    Dots,
    Line,
}

impl RenderMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderMode::Dots => "dots",
            RenderMode::Line => "line",
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenderMode {
    type Err = GonioError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "dots" => Ok(RenderMode::Dots),
            "line" => Ok(RenderMode::Line),
            other => Err(GonioError::InvalidConfig(format!("unknown render mode `{other}`"))),
        }
    }
}

/// Screen placement derived from the backing size of the surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
    pub center_x: f32,
    pub center_y: f32,
    /// Pixels per unit of normalised amplitude.
    pub scale: f32,
}

impl Geometry {
    pub fn new(width: u32, height: u32, scale_fraction: f32) -> Self {
        Self {
            width,
            height,
            center_x: width as f32 / 2.0,
            center_y: height as f32 / 2.0,
            scale: width.min(height) as f32 * scale_fraction,
        }
    }

    /// Goniometer projection: side (`l - r`) on x, mid (`l + r`) up the y axis.
    pub fn project(&self, left: f32, right: f32) -> Point {
        Point::new(
            self.center_x + (left - right) * self.scale,
            self.center_y - (left + right) * self.scale,
        )
    }
}

/// Counters describing one rendered frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RenderStats {
    pub points: usize,
    pub particles: usize,
    pub spawned: bool,
}

/// Stateful goniometer renderer. Besides the mode switches its only evolving
/// state is the normalisation factor, the gradient hue and the particles.
pub struct StereoFieldRenderer {
    config: VisualConfig,
    color_mode: ColorMode,
    render_mode: RenderMode,
    particles_enabled: bool,
    normalization: f32,
    hue: f32,
    dot_color: Rgb,
    geometry: Geometry,
    particles: ParticleSystem,
    rng: SmallRng,
    points: Vec<Point>,
    colors: Vec<Rgb>,
}

impl StereoFieldRenderer {
    pub fn new<S: Surface + ?Sized>(config: &VisualConfig, surface: &mut S) -> Self {
        Self::with_rng(config, surface, SmallRng::from_entropy())
    }

    /// Deterministic particle spawning for reproducible output.
    pub fn with_seed<S: Surface + ?Sized>(config: &VisualConfig, surface: &mut S, seed: u64) -> Self {
        Self::with_rng(config, surface, SmallRng::seed_from_u64(seed))
    }

    fn with_rng<S: Surface + ?Sized>(config: &VisualConfig, surface: &mut S, rng: SmallRng) -> Self {
        let (width, height) = surface.backing_size();
        let mut renderer = Self {
            config: config.clone(),
            color_mode: config.color_mode,
            render_mode: config.render_mode,
            particles_enabled: config.particles_enabled,
            normalization: 1.0,
            hue: config.gradient_start_hue,
            dot_color: config.static_color,
            geometry: Geometry::new(width, height, config.scale_fraction),
            particles: ParticleSystem::from_config(config),
            rng,
            points: Vec::new(),
            colors: Vec::new(),
        };
        renderer.on_resize(surface);
        renderer
    }

    /// Brings the backing store in line with the displayed size and updates
    /// centre and scale. Returns whether anything changed.
    pub fn on_resize<S: Surface + ?Sized>(&mut self, surface: &mut S) -> bool {
        let (width, height) = surface.display_size();
        if surface.backing_size() == (width, height) {
            return false;
        }

        surface.resize_backing(width, height);
        self.geometry = Geometry::new(width, height, self.config.scale_fraction);
        tracing::debug!(width, height, "surface resized");
        true
    }

    /// Draws one frame from the given windows. Extra samples in the longer
    /// window are ignored.
    pub fn render<S: Surface + ?Sized>(&mut self, surface: &mut S, left: &[f32], right: &[f32]) -> RenderStats {
        surface.fill(Rgb::BLACK.with_alpha(1.0 - self.config.persistence));

        let len = left.len().min(right.len());
        let (left, right) = (&left[..len], &right[..len]);
        self.update_normalization(left, right);
        self.advance_color();

        let stride = match self.render_mode {
            RenderMode::Dots => self.config.dot_stride,
            RenderMode::Line => self.config.line_stride,
        }
        .max(1);

        self.points.clear();
        self.colors.clear();
        for i in (0..len).step_by(stride) {
            let l = left[i] * self.normalization;
            let r = right[i] * self.normalization;
            self.points.push(self.geometry.project(l, r));
            self.colors.push(match self.color_mode {
                ColorMode::Spectrum => Rgb::from_hue(spectrum_hue(l, r)),
                ColorMode::Static | ColorMode::Gradient => self.dot_color,
            });
        }

        match self.render_mode {
            RenderMode::Dots => {
                for (point, color) in self.points.iter().zip(&self.colors) {
                    surface.fill_circle(*point, self.config.point_size, color.opaque());
                }
            }
            RenderMode::Line => {
                if self.points.len() >= 2 {
                    surface.stroke_polyline(&self.points, &self.colors, self.config.line_width);
                }
            }
        }

        let mut spawned = false;
        if self.particles_enabled {
            if let Some(origin) = self.points.first().copied() {
                if self.rng.gen::<f32>() < self.config.particle_spawn_chance {
                    spawned = self.particles.spawn(origin, self.dot_color, &mut self.rng);
                }
            }
            self.particles.step(surface);
        }

        RenderStats {
            points: self.points.len(),
            particles: self.particles.len(),
            spawned,
        }
    }

    fn update_normalization(&mut self, left: &[f32], right: &[f32]) {
        let max_amplitude = left
            .iter()
            .chain(right)
            .fold(AMPLITUDE_FLOOR, |peak, sample| peak.max(sample.abs()));

        let target = if max_amplitude > AMPLITUDE_FLOOR {
            NORMALIZATION_TARGET / max_amplitude
        } else {
            1.0
        };
        self.normalization = self.normalization * NORMALIZATION_SMOOTHING
            + target * (1.0 - NORMALIZATION_SMOOTHING);
    }

    fn advance_color(&mut self) {
        match self.color_mode {
            ColorMode::Static => self.dot_color = self.config.static_color,
            ColorMode::Gradient => {
                self.hue = (self.hue + self.config.gradient_hue_step) % 360.0;
                self.dot_color = Rgb::from_hue(self.hue);
            }
            ColorMode::Spectrum => {}
        }
    }

    /// Switches colour policy. Entering gradient mode restarts the hue
    /// animation; entering static mode restores the configured colour.
    pub fn set_color_mode(&mut self, mode: ColorMode) {
        if mode == self.color_mode {
            return;
        }
        match mode {
            ColorMode::Gradient => self.hue = self.config.gradient_start_hue,
            ColorMode::Static => self.dot_color = self.config.static_color,
            ColorMode::Spectrum => {}
        }
        self.color_mode = mode;
    }

    pub fn cycle_color_mode(&mut self) -> ColorMode {
        self.set_color_mode(self.color_mode.next());
        self.color_mode
    }

    pub fn set_render_mode(&mut self, mode: RenderMode) {
        self.render_mode = mode;
    }

    /// Disabling particles freezes the live ones; they resume when re-enabled.
    pub fn set_particle_mode(&mut self, enabled: bool) {
        self.particles_enabled = enabled;
    }

    pub fn color_mode(&self) -> ColorMode {
        self.color_mode
    }

    pub fn render_mode(&self) -> RenderMode {
        self.render_mode
    }

    pub fn particles_enabled(&self) -> bool {
        self.particles_enabled
    }

    pub fn normalization_factor(&self) -> f32 {
        self.normalization
    }

    pub fn hue(&self) -> f32 {
        self.hue
    }

    pub fn dot_color(&self) -> Rgb {
        self.dot_color
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn particles(&self) -> &ParticleSystem {
        &self.particles
    }
}

impl fmt::Debug for StereoFieldRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StereoFieldRenderer")
            .field("color_mode", &self.color_mode)
            .field("render_mode", &self.render_mode)
            .field("particles_enabled", &self.particles_enabled)
            .field("normalization", &self.normalization)
            .field("hue", &self.hue)
            .field("geometry", &self.geometry)
            .field("particles", &self.particles.len())
            .finish()
    }
}

/// Hue from the point's distance to the centre in units of `scale`.
fn spectrum_hue(left: f32, right: f32) -> f32 {
    let distance = (left - right).hypot(left + right);
    (distance * 360.0) % 360.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer_with(config: VisualConfig, surface: &mut DrawList) -> StereoFieldRenderer {
        StereoFieldRenderer::with_seed(&config, surface, 11)
    }

    fn renderer(surface: &mut DrawList) -> StereoFieldRenderer {
        renderer_with(VisualConfig::default(), surface)
    }

    #[test]
    fn geometry_follows_smaller_dimension() {
        let geometry = Geometry::new(400, 200, 0.4);
        assert_eq!(geometry.center_x, 200.0);
        assert_eq!(geometry.center_y, 100.0);
        assert_eq!(geometry.scale, 80.0);
    }

    #[test]
    fn mono_plots_vertically_and_side_horizontally() {
        let geometry = Geometry::new(200, 200, 0.4);
        assert_eq!(geometry.project(0.5, 0.5), Point::new(100.0, 20.0));
        assert_eq!(geometry.project(0.5, -0.5), Point::new(180.0, 100.0));
        assert_eq!(geometry.project(0.0, 0.0), Point::new(100.0, 100.0));
    }

    #[test]
    fn overlays_previous_frame_with_persistence() {
        let mut surface = DrawList::new(100, 100);
        let mut renderer = renderer(&mut surface);
        renderer.render(&mut surface, &[0.0; 8], &[0.0; 8]);

        assert_eq!(
            surface.commands().first(),
            Some(&DrawCommand::Fill(Rgb::BLACK.with_alpha(0.5)))
        );
    }

    #[test]
    fn normalization_converges_to_target() {
        let mut surface = DrawList::new(100, 100);
        let mut renderer = renderer(&mut surface);
        let window = vec![0.5; 64];

        for _ in 0..200 {
            renderer.render(&mut surface, &window, &window);
            surface.clear();
        }
        assert!((renderer.normalization_factor() - 1.4).abs() < 1e-3);
    }

    #[test]
    fn normalization_moves_by_five_percent_per_frame() {
        let mut surface = DrawList::new(100, 100);
        let mut renderer = renderer(&mut surface);
        renderer.render(&mut surface, &[0.35], &[-0.1]);
        assert!((renderer.normalization_factor() - (0.95 + 0.05 * 2.0)).abs() < 1e-6);
    }

    #[test]
    fn silence_drifts_back_to_unity() {
        let mut surface = DrawList::new(100, 100);
        let mut renderer = renderer(&mut surface);
        let window = vec![0.0; 32];
        for _ in 0..10 {
            renderer.render(&mut surface, &window, &window);
        }
        assert_eq!(renderer.normalization_factor(), 1.0);
    }

    #[test]
    fn dots_mode_draws_every_sample() {
        let mut surface = DrawList::new(100, 100);
        let mut renderer = renderer(&mut surface);
        let stats = renderer.render(&mut surface, &[0.1; 16], &[0.2; 16]);

        assert_eq!(stats.points, 16);
        assert_eq!(surface.circles().count(), 16);
        assert!(surface.circles().all(|(_, radius, color)| {
            radius == 2.0 && color == Rgb::GREEN.opaque()
        }));
        assert_eq!(surface.polylines().count(), 0);
    }

    #[test]
    fn line_mode_draws_one_open_polyline() {
        let mut surface = DrawList::new(100, 100);
        let mut renderer = renderer(&mut surface);
        renderer.set_render_mode(RenderMode::Line);
        let left: Vec<f32> = (0..16).map(|i| i as f32 / 16.0).collect();
        let stats = renderer.render(&mut surface, &left, &left);

        assert_eq!(stats.points, 4);
        assert_eq!(surface.circles().count(), 0);
        let lines: Vec<&[Point]> = surface.polylines().collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), 4);
        assert_ne!(lines[0].first(), lines[0].last());
    }

    #[test]
    fn line_mode_skips_single_point() {
        let mut surface = DrawList::new(100, 100);
        let mut renderer = renderer(&mut surface);
        renderer.set_render_mode(RenderMode::Line);
        renderer.render(&mut surface, &[0.3; 3], &[0.3; 3]);
        assert_eq!(surface.polylines().count(), 0);
    }

    #[test]
    fn gradient_hue_is_shared_and_advances_each_frame() {
        let mut surface = DrawList::new(100, 100);
        let mut renderer = renderer(&mut surface);
        renderer.set_color_mode(ColorMode::Gradient);

        for _ in 0..3 {
            renderer.render(&mut surface, &[0.1, 0.9, -0.4], &[0.5, 0.0, 0.2]);
        }
        assert!((renderer.hue() - 120.3).abs() < 1e-3);

        let colors: Vec<Rgba> = surface.circles().map(|(_, _, color)| color).collect();
        assert_eq!(colors.len(), 9);
        assert!(colors[6..].iter().all(|color| *color == colors[6]));
    }

    #[test]
    fn gradient_hue_wraps() {
        let mut surface = DrawList::new(100, 100);
        let mut renderer = renderer_with(
            VisualConfig {
                gradient_start_hue: 359.5,
                gradient_hue_step: 1.0,
                color_mode: ColorMode::Static,
                ..VisualConfig::default()
            },
            &mut surface,
        );
        renderer.set_color_mode(ColorMode::Gradient);
        renderer.render(&mut surface, &[0.0], &[0.0]);
        assert!((renderer.hue() - 0.5).abs() < 1e-4);
    }

    #[test]
    fn spectrum_colors_follow_distance() {
        let mut surface = DrawList::new(100, 100);
        let mut renderer = renderer(&mut surface);
        renderer.set_color_mode(ColorMode::Spectrum);
        renderer.render(&mut surface, &[0.0, 0.05], &[0.0, 0.0]);

        let colors: Vec<Rgb> = surface.circles().map(|(_, _, c)| c.color).collect();
        assert_eq!(colors[0], Rgb::new(255, 0, 0));
        assert_ne!(colors[0], colors[1]);
    }

    #[test]
    fn spectrum_hue_wraps_every_unit_of_distance() {
        assert_eq!(spectrum_hue(0.0, 0.0), 0.0);
        let half = spectrum_hue(0.25, 0.25);
        assert!((half - 0.5_f32.hypot(0.0) * 360.0).abs() < 1e-3);
        let beyond = spectrum_hue(1.0, 1.0);
        assert!((0.0..360.0).contains(&beyond));
    }

    #[test]
    fn cycling_color_modes_resets_state() {
        let mut surface = DrawList::new(100, 100);
        let amber = Rgb::new(255, 191, 0);
        let mut renderer = renderer_with(
            VisualConfig {
                static_color: amber,
                ..VisualConfig::default()
            },
            &mut surface,
        );

        assert_eq!(renderer.cycle_color_mode(), ColorMode::Gradient);
        renderer.render(&mut surface, &[0.0], &[0.0]);
        assert_eq!(renderer.dot_color(), Rgb::GREEN);

        assert_eq!(renderer.cycle_color_mode(), ColorMode::Spectrum);
        assert_eq!(renderer.cycle_color_mode(), ColorMode::Static);
        assert_eq!(renderer.dot_color(), amber);

        assert_eq!(renderer.cycle_color_mode(), ColorMode::Gradient);
        assert_eq!(renderer.hue(), 120.0);
    }

    #[test]
    fn particles_spawn_from_first_sample_in_any_mode() {
        let mut surface = DrawList::new(200, 200);
        let config = VisualConfig {
            particles_enabled: true,
            particle_spawn_chance: 1.0,
            max_particles: 3,
            ..VisualConfig::default()
        };
        let mut renderer = renderer_with(config, &mut surface);
        renderer.set_render_mode(RenderMode::Line);

        let stats = renderer.render(&mut surface, &[0.0, 0.3], &[0.0, 0.1]);
        assert!(stats.spawned);
        assert_eq!(stats.particles, 1);

        for _ in 0..10 {
            let stats = renderer.render(&mut surface, &[0.0, 0.3], &[0.0, 0.1]);
            assert!(stats.particles <= 3);
        }
        assert_eq!(renderer.particles().len(), 3);
    }

    #[test]
    fn particles_are_off_by_default() {
        let mut surface = DrawList::new(100, 100);
        let mut renderer = renderer(&mut surface);
        for _ in 0..50 {
            let stats = renderer.render(&mut surface, &[0.5; 4], &[0.5; 4]);
            assert!(!stats.spawned);
        }
        assert!(renderer.particles().is_empty());
    }

    #[test]
    fn resize_updates_backing_and_geometry() {
        let mut surface = DrawList::new(100, 100);
        let mut renderer = renderer(&mut surface);
        assert!(!renderer.on_resize(&mut surface));

        surface.set_display_size(300, 150);
        assert!(renderer.on_resize(&mut surface));
        assert_eq!(surface.backing_size(), (300, 150));
        assert_eq!(renderer.geometry(), Geometry::new(300, 150, 0.4));
        assert!(!renderer.on_resize(&mut surface));
    }

    #[test]
    fn construction_adopts_display_size() {
        let mut surface = DrawList::new(10, 10);
        surface.set_display_size(640, 480);
        let renderer = renderer(&mut surface);
        assert_eq!(surface.backing_size(), (640, 480));
        assert_eq!(renderer.geometry().scale, 192.0);
    }

    #[test]
    fn parses_mode_names() {
        assert_eq!("Gradient".parse::<ColorMode>().unwrap(), ColorMode::Gradient);
        assert_eq!("line".parse::<RenderMode>().unwrap(), RenderMode::Line);
        assert!("sparkles".parse::<ColorMode>().is_err());
        assert_eq!(ColorMode::Spectrum.to_string(), "spectrum");
    }
}
