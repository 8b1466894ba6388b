//! WAV decoding into mono PCM

use crate::config::{DEFAULT_MAX_SAMPLE_RATE_HZ, DEFAULT_MIN_SAMPLE_RATE_HZ};
use crate::error::ScreeningError;
use std::io::Cursor;
use std::ops::RangeInclusive;

/// Mono PCM decoded from a WAV container
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Samples normalized to [-1.0, 1.0]
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Channel count of the source before mixing
    pub source_channels: u16,
}

impl DecodedAudio {
    pub fn duration_sec(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decode WAV bytes, mixing all channels down to mono
///
/// Headers declaring a sample rate outside 4 kHz to 192 kHz are rejected.
pub fn decode_wav(bytes: &[u8]) -> Result<DecodedAudio, ScreeningError> {
    decode_wav_within(bytes, DEFAULT_MIN_SAMPLE_RATE_HZ..=DEFAULT_MAX_SAMPLE_RATE_HZ)
}

/// Decode WAV bytes, rejecting headers whose sample rate falls outside `rates`
/// before any sample is read
pub(crate) fn decode_wav_within(
    bytes: &[u8],
    rates: RangeInclusive<u32>,
) -> Result<DecodedAudio, ScreeningError> {
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| ScreeningError::InvalidInput(format!("Cannot decode WAV: {e}")))?;
    let spec = reader.spec();

    if spec.channels == 0 {
        return Err(ScreeningError::InvalidInput(
            "WAV header declares no channels".to_string(),
        ));
    }
    if spec.sample_rate == 0 || !rates.contains(&spec.sample_rate) {
        return Err(ScreeningError::InvalidInput(format!(
            "WAV sample rate {} Hz is outside {}..={} Hz",
            spec.sample_rate,
            rates.start(),
            rates.end()
        )));
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ScreeningError::InvalidInput(format!("Corrupt WAV samples: {e}")))?,
        hound::SampleFormat::Int => {
            let max_value = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| s as f32 / max_value))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| ScreeningError::InvalidInput(format!("Corrupt WAV samples: {e}")))?
        }
    };

    let channels = spec.channels as usize;
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    log::debug!(
        "Decoded WAV: {} Hz, {} channel(s), {} mono samples",
        spec.sample_rate,
        spec.channels,
        samples.len()
    );

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
        source_channels: spec.channels,
    })
}
