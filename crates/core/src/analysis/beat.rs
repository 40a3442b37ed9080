use crate::config::BeatConfig;

/// Energy-threshold beat detector with an exponentially decaying baseline and
/// a refractory hold after every detected beat.
///
/// All constants apply per call, so the effective hold time and baseline
/// half-life scale with the host's frame rate.
#[derive(Debug, Clone)]
pub struct BeatDetector {
    enabled: bool,
    threshold: f32,
    decay: f32,
    hold_frames: u32,
    energy_baseline: f32,
    hold_counter: u32,
}

impl BeatDetector {
    pub fn new(config: &BeatConfig) -> Self {
        Self {
            enabled: config.enabled,
            threshold: config.threshold,
            decay: config.decay,
            hold_frames: config.hold_frames,
            energy_baseline: 0.0,
            hold_counter: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn energy_baseline(&self) -> f32 {
        self.energy_baseline
    }

    /// Frames left before another beat can fire.
    pub fn hold_counter(&self) -> u32 {
        self.hold_counter
    }

    /// Feeds one frame of windows and reports whether it carries a beat.
    /// A disabled detector always answers `false` and leaves its state alone.
    pub fn detect(&mut self, left: &[f32], right: &[f32]) -> bool {
        if !self.enabled {
            return false;
        }

        let energy = window_energy(left, right);

        if self.hold_counter > 0 {
            self.hold_counter -= 1;
            return false;
        }

        if energy > self.threshold * self.energy_baseline {
            self.energy_baseline = energy;
            self.hold_counter = self.hold_frames;
            return true;
        }

        self.energy_baseline = self.energy_baseline * self.decay + energy * (1.0 - self.decay);
        false
    }
}

/// Mean of `l² + r²` over the common length of both windows.
pub fn window_energy(left: &[f32], right: &[f32]) -> f32 {
    let len = left.len().min(right.len());
    if len == 0 {
        return 0.0;
    }

    let sum: f32 = left
        .iter()
        .zip(right)
        .map(|(l, r)| l * l + r * r)
        .sum();
    sum / len as f32
}
