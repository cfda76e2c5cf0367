//! Wave file loading for 16-bit PCM clips.

use crate::clip::SoundClip;
use hound::{SampleFormat, WavReader};
use std::io::Read;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WavError {
    #[error("failed to read wave data: {0}")]
    Wav(#[from] hound::Error),
    #[error("unsupported sample format {0:?}, only integer PCM is supported")]
    UnsupportedFormat(SampleFormat),
    #[error("unsupported sample size {0} bits, expected 16")]
    UnsupportedBits(u16),
    #[error("unsupported channel count {0}")]
    UnsupportedChannels(u16),
    #[error("sample rate {found} Hz does not match output rate {expected} Hz")]
    SampleRate { found: u32, expected: u32 },
}

fn read_clip<R: Read>(mut reader: WavReader<R>, sample_rate: u32) -> Result<SoundClip, WavError> {
    let spec = reader.spec();
    if spec.sample_format != SampleFormat::Int {
        return Err(WavError::UnsupportedFormat(spec.sample_format));
    }
    if spec.bits_per_sample != 16 {
        return Err(WavError::UnsupportedBits(spec.bits_per_sample));
    }
    if !(1..=2).contains(&spec.channels) {
        return Err(WavError::UnsupportedChannels(spec.channels));
    }
    if spec.sample_rate != sample_rate {
        return Err(WavError::SampleRate {
            found: spec.sample_rate,
            expected: sample_rate,
        });
    }

    let samples = reader
        .samples::<i16>()
        .collect::<Result<Vec<i16>, hound::Error>>()?;

    let clip = if spec.channels == 1 {
        SoundClip::mono(samples)
    } else {
        SoundClip::from_interleaved_stereo(&samples)
    };
    tracing::debug!(
        channels = spec.channels,
        samples = clip.sample_count(),
        "decoded wave data"
    );
    Ok(clip)
}

/// Decode an in-memory wave file whose rate must be `sample_rate`.
pub fn decode(bytes: &[u8], sample_rate: u32) -> Result<SoundClip, WavError> {
    read_clip(WavReader::new(bytes)?, sample_rate)
}

pub fn load(path: impl AsRef<Path>, sample_rate: u32) -> Result<SoundClip, WavError> {
    let path = path.as_ref();
    let reader = WavReader::open(path)?;
    tracing::info!(
        path = %path.display(),
        frames = reader.duration(),
        "loading wave file"
    );
    read_clip(reader, sample_rate)
}
