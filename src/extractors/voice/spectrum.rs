//! Whole-clip spectral descriptors
//!
//! Computes a single Hann-windowed FFT over the clip and derives harmonicity,
//! spectral centroid, spectral rolloff, and (in the time domain) zero-crossing rate.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

const EPSILON: f64 = 1e-12;

/// Floor inside the HNR logarithm; caps HNR at 40 dB for a perfectly harmonic clip
const HNR_FLOOR: f64 = 1e-4;

/// Spectral descriptors of a clip
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct SpectralSummary {
    pub harmonicity: f64,
    pub hnr_db: f64,
    pub centroid_hz: f64,
    pub rolloff_hz: f64,
    pub dominant_hz: f64,
}

/// Spectral analysis settings
#[derive(Debug, Clone, Copy)]
pub(crate) struct SpectrumSettings {
    pub harmonics: usize,
    pub bin_tolerance: usize,
    pub rolloff_fraction: f64,
}

/// Power spectrum (bins 0..=N/2) of a Hann-windowed, mean-removed signal
pub(crate) fn power_spectrum(samples: &[f32]) -> Vec<f64> {
    let n = samples.len();
    if n < 2 {
        return Vec::new();
    }

    let mean = samples.iter().map(|s| *s as f64).sum::<f64>() / n as f64;
    let mut buffer: Vec<Complex<f64>> = samples
        .iter()
        .enumerate()
        .map(|(i, s)| Complex::new((*s as f64 - mean) * hann(i, n), 0.0))
        .collect();

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n);
    fft.process(&mut buffer);

    buffer[..=n / 2].iter().map(|c| c.norm_sqr()).collect()
}

fn hann(i: usize, n: usize) -> f64 {
    0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / (n - 1) as f64).cos()
}

/// Summarize a clip's spectrum
pub(crate) fn summarize(samples: &[f32], sample_rate: u32, settings: SpectrumSettings) -> SpectralSummary {
    let power = power_spectrum(samples);
    let total: f64 = power.iter().sum();
    if power.len() < 2 || total <= EPSILON {
        return SpectralSummary::default();
    }

    let bin_hz = sample_rate as f64 / samples.len() as f64;

    let dominant = power
        .iter()
        .enumerate()
        .skip(1)
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(k, _)| k)
        .unwrap_or(1);

    let harmonicity = harmonic_ratio(&power, dominant, settings, total);
    let hnr_db = -10.0 * (1.0 - harmonicity + HNR_FLOOR).log10();

    // Centroid and rolloff both weight bins by power
    let centroid_hz = power
        .iter()
        .enumerate()
        .map(|(k, p)| k as f64 * bin_hz * p)
        .sum::<f64>()
        / total;

    let target = total * settings.rolloff_fraction;
    let mut cumulative = 0.0;
    let mut rolloff_bin = power.len() - 1;
    for (k, p) in power.iter().enumerate() {
        cumulative += p;
        if cumulative >= target {
            rolloff_bin = k;
            break;
        }
    }

    SpectralSummary {
        harmonicity,
        hnr_db: hnr_db.max(0.0),
        centroid_hz,
        rolloff_hz: rolloff_bin as f64 * bin_hz,
        dominant_hz: dominant as f64 * bin_hz,
    }
}

/// Energy at the first `harmonics` multiples of the dominant bin over total energy
fn harmonic_ratio(power: &[f64], dominant: usize, settings: SpectrumSettings, total: f64) -> f64 {
    let mut counted = vec![false; power.len()];
    let mut harmonic_energy = 0.0;

    for h in 1..=settings.harmonics {
        let centre = dominant * h;
        if centre >= power.len() {
            break;
        }
        let low = centre.saturating_sub(settings.bin_tolerance).max(1);
        let high = (centre + settings.bin_tolerance).min(power.len() - 1);
        for k in low..=high {
            if !counted[k] {
                counted[k] = true;
                harmonic_energy += power[k];
            }
        }
    }

    (harmonic_energy / total).clamp(0.0, 1.0)
}

/// Sign changes per sample
pub(crate) fn zero_crossing_rate(samples: &[f32]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let crossings = samples
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f64 / (samples.len() - 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::tone;

    fn settings() -> SpectrumSettings {
        SpectrumSettings {
            harmonics: 5,
            bin_tolerance: 2,
            rolloff_fraction: 0.85,
        }
    }

    #[test]
    fn test_pure_tone_is_harmonic() {
        let samples = tone(220.0, 16_000, 1.0, 0.5);
        let summary = summarize(&samples, 16_000, settings());

        assert!((summary.dominant_hz - 220.0).abs() < 2.0);
        assert!(summary.harmonicity > 0.95);
        assert!(summary.hnr_db > 10.0);
        assert!((summary.centroid_hz - 220.0).abs() < 50.0);
    }

    #[test]
    fn test_noise_is_less_harmonic_than_tone() {
        // Deterministic pseudo-noise from a linear congruential sequence
        let mut state: u32 = 12345;
        let noise: Vec<f32> = (0..16_000)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 8) as f32 / (1u32 << 24) as f32 - 0.5
            })
            .collect();
        let tone_summary = summarize(&tone(220.0, 16_000, 1.0, 0.5), 16_000, settings());
        let noise_summary = summarize(&noise, 16_000, settings());

        assert!(noise_summary.harmonicity < 0.1);
        assert!(noise_summary.hnr_db < tone_summary.hnr_db);
        assert!(noise_summary.centroid_hz > tone_summary.centroid_hz);
    }

    #[test]
    fn test_centroid_and_rolloff_share_power_weighting() {
        // 200 Hz carries 100x the power of 4 kHz
        let strong = tone(200.0, 16_000, 1.0, 0.5);
        let weak = tone(4_000.0, 16_000, 1.0, 0.05);
        let mixed: Vec<f32> = strong.iter().zip(&weak).map(|(a, b)| a + b).collect();

        let summary = summarize(&mixed, 16_000, settings());

        let expected = (200.0 * 0.25 + 4_000.0 * 0.0025) / (0.25 + 0.0025);
        assert!((summary.centroid_hz - expected).abs() < 5.0);
        assert!((summary.rolloff_hz - 200.0).abs() <= 2.0);
        assert!(summary.rolloff_hz <= summary.centroid_hz);
    }

    #[test]
    fn test_silence_summary_is_zero() {
        let summary = summarize(&[0.0; 1024], 16_000, settings());
        assert_eq!(summary, SpectralSummary::default());
    }

    #[test]
    fn test_zero_crossing_rate() {
        assert_eq!(zero_crossing_rate(&[1.0, -1.0, 1.0, -1.0, 1.0]), 1.0);
        assert_eq!(zero_crossing_rate(&[0.0; 10]), 0.0);
        assert_eq!(zero_crossing_rate(&[0.5]), 0.0);
    }
}
