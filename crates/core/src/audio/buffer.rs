use crate::{GonioError, Result};

/// Fully decoded stereo PCM. Immutable once built; replacing a track means
/// building a new buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBuffer {
    sample_rate: u32,
    left: Vec<f32>,
    right: Vec<f32>,
}

impl DecodedBuffer {
    /// Builds a buffer from planar channel data. Mono input is doubled onto
    /// both sides and channels beyond the second are dropped.
    pub fn from_channels(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self> {
        if sample_rate == 0 {
            return Err(GonioError::Decode("sample rate must be positive".into()));
        }

        let mut channels = channels.into_iter();
        let left = channels
            .next()
            .ok_or_else(|| GonioError::Decode("buffer has no channels".into()))?;
        let right = channels.next().unwrap_or_else(|| left.clone());

        if left.is_empty() {
            return Err(GonioError::Decode("buffer contains no samples".into()));
        }
        if left.len() != right.len() {
            return Err(GonioError::Decode(format!(
                "channel lengths differ ({} vs {})",
                left.len(),
                right.len()
            )));
        }

        Ok(Self {
            sample_rate,
            left,
            right,
        })
    }

    /// Builds a buffer from interleaved frames of `channel_count` samples.
    pub fn from_interleaved(sample_rate: u32, channel_count: usize, samples: &[f32]) -> Result<Self> {
        if channel_count == 0 {
            return Err(GonioError::Decode("buffer has no channels".into()));
        }
        if samples.len() % channel_count != 0 {
            return Err(GonioError::Decode(format!(
                "{} samples do not divide into {channel_count} channels",
                samples.len()
            )));
        }

        let frames = samples.len() / channel_count;
        let kept = channel_count.min(2);
        let mut channels = vec![Vec::with_capacity(frames); kept];
        for frame in samples.chunks_exact(channel_count) {
            for (channel, sample) in channels.iter_mut().zip(frame) {
                channel.push(*sample);
            }
        }

        Self::from_channels(sample_rate, channels)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples per channel.
    pub fn frames(&self) -> usize {
        self.left.len()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    pub fn left(&self) -> &[f32] {
        &self.left
    }

    pub fn right(&self) -> &[f32] {
        &self.right
    }

    /// Frame index for a playback position, clamped to the buffer.
    pub fn frame_at(&self, seconds: f64) -> usize {
        let frame = (seconds.max(0.0) * f64::from(self.sample_rate)).round() as usize;
        frame.min(self.frames())
    }
}
