use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};

use crate::{DecodedBuffer, GonioError, Result};

pub mod beat;

pub use beat::BeatDetector;

/// Most recent time-domain samples for both channels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisWindow {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

impl AnalysisWindow {
    pub fn silent(size: usize) -> Self {
        Self {
            left: vec![0.0; size],
            right: vec![0.0; size],
        }
    }

    pub fn len(&self) -> usize {
        self.left.len().min(self.right.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Magnitude spectrum per channel, `window_size / 2 + 1` bins each.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectrumWindow {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
    /// Width of one bin in Hz.
    pub bin_hz: f32,
}

/// Reads fixed-size per-channel windows out of a decoded buffer at a given
/// playback position. Windows end at the position and reach `window_size`
/// samples back, zero-padded before the start of the track.
pub struct ChannelAnalyzer {
    window_size: usize,
    hann: Vec<f32>,
    fft: FftResources,
}

impl ChannelAnalyzer {
    pub fn new(window_size: usize) -> Result<Self> {
        if window_size < 2 || !window_size.is_power_of_two() {
            return Err(GonioError::InvalidInput(
                "analysis window size must be a power of two",
            ));
        }

        Ok(Self {
            window_size,
            hann: (0..window_size).map(|i| hann_value(i, window_size)).collect(),
            fft: FftResources::new(window_size),
        })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Fills `out` with the samples preceding `position_seconds`, scaled by
    /// `gain`. Reuses the vectors already held by `out`.
    pub fn capture(
        &self,
        buffer: &DecodedBuffer,
        position_seconds: f64,
        gain: f32,
        out: &mut AnalysisWindow,
    ) {
        let end = buffer.frame_at(position_seconds);
        fill_channel(buffer.left(), end, self.window_size, gain, &mut out.left);
        fill_channel(buffer.right(), end, self.window_size, gain, &mut out.right);
    }

    pub fn time_domain(&self, buffer: &DecodedBuffer, position_seconds: f64, gain: f32) -> AnalysisWindow {
        let mut window = AnalysisWindow::default();
        self.capture(buffer, position_seconds, gain, &mut window);
        window
    }

    /// Hann-windowed magnitude spectrum of the same samples [`capture`]
    /// would return. Magnitudes are scaled so a full-scale sine peaks near 1.
    ///
    /// [`capture`]: Self::capture
    pub fn spectrum(
        &mut self,
        buffer: &DecodedBuffer,
        position_seconds: f64,
        gain: f32,
    ) -> Result<SpectrumWindow> {
        let samples = self.time_domain(buffer, position_seconds, gain);
        let left = self.magnitudes(&samples.left)?;
        let right = self.magnitudes(&samples.right)?;

        Ok(SpectrumWindow {
            left,
            right,
            bin_hz: buffer.sample_rate() as f32 / self.window_size as f32,
        })
    }

    fn magnitudes(&mut self, samples: &[f32]) -> Result<Vec<f32>> {
        let scale = 4.0 / self.window_size as f32;
        let fft = &mut self.fft;

        for ((slot, sample), weight) in fft.input.iter_mut().zip(samples).zip(&self.hann) {
            *slot = sample * weight;
        }

        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)?;

        Ok(fft.spectrum.iter().map(|bin| bin.norm() * scale).collect())
    }
}

fn fill_channel(source: &[f32], end: usize, size: usize, gain: f32, out: &mut Vec<f32>) {
    out.clear();
    out.resize(size, 0.0);

    let available = end.min(size);
    let start = end - available;
    let padding = size - available;
    for (slot, sample) in out[padding..].iter_mut().zip(&source[start..end]) {
        *slot = sample * gain;
    }
}

struct FftResources {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl FftResources {
    fn new(size: usize) -> Self {
        let plan = RealFftPlanner::<f32>::new().plan_fft_forward(size);
        Self {
            size,
            scratch: plan.make_scratch_vec(),
            spectrum: plan.make_output_vec(),
            input: plan.make_input_vec(),
            plan,
        }
    }
}

impl fmt::Debug for ChannelAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelAnalyzer")
            .field("window_size", &self.window_size)
            .field("fft", &self.fft)
            .finish()
    }
}

impl fmt::Debug for FftResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftResources")
            .field("size", &self.size)
            .finish()
    }
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}
