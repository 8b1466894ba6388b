//! Voice recording feature extraction
//!
//! Pipeline: PCM samples → 25 ms frames → per-frame pitch/amplitude tracking
//! (jitter, shimmer, f0 variation) → whole-clip spectrum (harmonicity, HNR,
//! centroid, rolloff) → per-frame MFCCs.
//!
//! Empty or silent input never fails: it yields [`VoiceFeatures::degenerate`].

mod mfcc;
mod pitch;
mod spectrum;
mod wav;

pub use wav::{decode_wav, DecodedAudio};

use crate::config::VoiceConfig;
use crate::error::ScreeningError;
use crate::types::{QualityFlag, VoiceFeatures};
use mfcc::MfccAnalyzer;
use pitch::{frames, rms, track, PitchSearch};
use spectrum::{summarize, zero_crossing_rate, SpectrumSettings};

/// Share of samples at full scale above which the clip is flagged as clipped
const CLIPPED_SHARE: f64 = 0.01;

/// Extractor for voice recordings
#[derive(Debug, Clone, Default)]
pub struct VoiceExtractor {
    config: VoiceConfig,
}

impl VoiceExtractor {
    pub fn new(config: VoiceConfig) -> Self {
        Self { config }
    }

    /// Decode a WAV recording and extract voice features
    pub fn extract_wav(&self, bytes: &[u8]) -> Result<VoiceFeatures, ScreeningError> {
        let audio = wav::decode_wav_within(bytes, self.config.sample_rates())?;
        self.extract(&audio.samples, audio.sample_rate)
    }

    /// Extract voice features from mono samples in [-1.0, 1.0]
    pub fn extract(&self, samples: &[f32], sample_rate: u32) -> Result<VoiceFeatures, ScreeningError> {
        if sample_rate == 0 || !self.config.sample_rates().contains(&sample_rate) {
            return Err(ScreeningError::InvalidInput(format!(
                "Sample rate {sample_rate} Hz is outside {}..={} Hz",
                self.config.min_sample_rate_hz, self.config.max_sample_rate_hz
            )));
        }
        if samples.iter().any(|s| !s.is_finite()) {
            return Err(ScreeningError::InvalidInput(
                "Audio contains non-finite samples".to_string(),
            ));
        }

        log::debug!(
            "Extracting voice features: {} samples at {} Hz",
            samples.len(),
            sample_rate
        );

        if samples.is_empty() || rms(samples) < self.config.silence_rms {
            log::warn!("Voice clip is empty or silent; using degenerate features");
            return Ok(VoiceFeatures::degenerate());
        }

        let frame_len = ms_to_samples(self.config.frame_ms, sample_rate);
        let hop = ms_to_samples(self.config.hop_ms, sample_rate);
        let framed = frames(samples, frame_len, hop);

        let search = PitchSearch::new(
            sample_rate,
            self.config.min_f0_hz,
            self.config.max_f0_hz,
            self.config.voicing_threshold,
            self.config.silence_rms,
        );
        let tracked = track(&framed, &search);

        let f0 = tracked.voiced_f0();
        let (mean_f0_hz, f0_variation) = coefficient_of_variation(&f0);

        let summary = summarize(
            samples,
            sample_rate,
            SpectrumSettings {
                harmonics: self.config.harmonics,
                bin_tolerance: self.config.harmonic_bin_tolerance,
                rolloff_fraction: self.config.rolloff_fraction,
            },
        );

        let active: Vec<&[f32]> = framed
            .iter()
            .zip(&tracked.peaks)
            .filter(|(_, peak)| peak.is_some())
            .map(|(frame, _)| *frame)
            .collect();
        let mut analyzer = MfccAnalyzer::new(frame_len, sample_rate, self.config.mel_filters);
        let mfcc = analyzer.mean_coefficients(&active);

        let mut quality_flags = Vec::new();
        if f0.len() < 2 {
            quality_flags.push(QualityFlag::LowVoicing);
        }
        let clipped = samples.iter().filter(|s| s.abs() >= 0.999).count();
        if clipped as f64 / samples.len() as f64 > CLIPPED_SHARE {
            quality_flags.push(QualityFlag::Clipped);
        }

        let features = VoiceFeatures {
            mfcc,
            jitter: tracked.jitter(),
            shimmer: tracked.shimmer(),
            harmonicity: summary.harmonicity,
            hnr: summary.hnr_db,
            f0_variation,
            spectral_centroid: summary.centroid_hz,
            spectral_rolloff: summary.rolloff_hz,
            zero_crossing_rate: zero_crossing_rate(samples),
            mean_f0_hz,
            voiced_frames: f0.len(),
            quality_flags,
        };

        log::debug!(
            "Voice features: jitter {:.4}, shimmer {:.4}, hnr {:.2} dB, {} voiced frames",
            features.jitter,
            features.shimmer,
            features.hnr,
            features.voiced_frames
        );

        Ok(features)
    }
}

fn ms_to_samples(ms: f64, sample_rate: u32) -> usize {
    ((ms / 1000.0) * sample_rate as f64).round().max(1.0) as usize
}

/// (mean, std / mean); (0, 0) when empty or zero-mean
fn coefficient_of_variation(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return (0.0, 0.0);
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt() / mean)
}
