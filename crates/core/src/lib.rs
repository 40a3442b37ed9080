//! Core library for the Gonioscope stereo phase player.
//!
//! A [`Player`] owns a playback session ([`AudioEngine`]), a [`BeatDetector`]
//! and a [`StereoFieldRenderer`]. The host drives it with one
//! [`Player::tick`] per frame and forwards transport and visual controls.
//! Decoding and sound output sit behind the [`Decoder`] and [`OutputDevice`]
//! traits; drawing goes through [`Surface`].

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod player;
pub mod render;
pub mod timeline;

pub use analysis::{AnalysisWindow, BeatDetector, ChannelAnalyzer, SpectrumWindow};
pub use audio::{AudioEngine, DecodedBuffer, Decoder, HeadlessOutput, OutputDevice, SymphoniaDecoder};
pub use config::{AnalysisConfig, AppConfig, BeatConfig, TransportConfig, VisualConfig};
pub use error::{GonioError, Result};
pub use player::{FrameReport, Player};
pub use render::{
    ColorMode, DrawList, Framebuffer, Point, RenderMode, RenderStats, Rgb, StereoFieldRenderer, Surface,
};
pub use timeline::{format_time, Clock, ManualClock, MonotonicClock, PlaybackState, TransportClock};
