use std::{io::Cursor, path::Path};

use symphonia::core::{
    audio::SampleBuffer,
    codecs::{DecoderOptions, CODEC_TYPE_NULL},
    errors::Error as SymphoniaError,
    formats::FormatOptions,
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};

use crate::{DecodedBuffer, GonioError, Result};

/// Turns encoded bytes into a complete [`DecodedBuffer`]. Implementations
/// either return the whole track or an error, never a partial buffer.
pub trait Decoder {
    fn decode(&self, raw: Vec<u8>) -> Result<DecodedBuffer>;
}

/// Decoder backed by symphonia's default codec and format registries.
#[derive(Debug, Clone, Default)]
pub struct SymphoniaDecoder {
    extension: Option<String>,
}

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses the file extension of `path` as a probing hint.
    pub fn for_path(path: &Path) -> Self {
        Self {
            extension: path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(str::to_owned),
        }
    }
}

impl Decoder for SymphoniaDecoder {
    fn decode(&self, raw: Vec<u8>) -> Result<DecodedBuffer> {
        if raw.is_empty() {
            return Err(GonioError::Decode("input is empty".into()));
        }

        let mss = MediaSourceStream::new(Box::new(Cursor::new(raw)), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = &self.extension {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(decode_error)?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| GonioError::Decode("no audio tracks found".into()))?;
        let track_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate;
        let mut channel_count = track.codec_params.channels.map(|c| c.count());
        let declared_frames = track.codec_params.n_frames;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(decode_error)?;

        let mut interleaved: Vec<f32> = Vec::new();
        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => {
                    return Err(GonioError::Decode("stream changed mid-track".into()));
                }
                Err(e) => return Err(decode_error(e)),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = decoder.decode(&packet).map_err(decode_error)?;

            let spec = *decoded.spec();
            sample_rate = sample_rate.or(Some(spec.rate));
            channel_count = channel_count.or(Some(spec.channels.count()));

            let mut samples = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
            samples.copy_interleaved_ref(decoded);
            interleaved.extend_from_slice(samples.samples());
        }

        let sample_rate =
            sample_rate.ok_or_else(|| GonioError::Decode("unknown sample rate".into()))?;
        let channel_count =
            channel_count.ok_or_else(|| GonioError::Decode("unknown channel layout".into()))?;

        let buffer = DecodedBuffer::from_interleaved(sample_rate, channel_count, &interleaved)?;
        if let Some(declared) = declared_frames {
            if (buffer.frames() as u64) < declared {
                tracing::warn!(decoded = buffer.frames(), declared, "audio stream is truncated");
                return Err(GonioError::Decode(format!(
                    "stream ends after {} of {declared} frames",
                    buffer.frames()
                )));
            }
        }
        tracing::debug!(
            frames = buffer.frames(),
            sample_rate,
            channels = channel_count,
            "decoded audio"
        );
        Ok(buffer)
    }
}

fn decode_error(error: SymphoniaError) -> GonioError {
    GonioError::Decode(error.to_string())
}
