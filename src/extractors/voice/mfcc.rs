//! Mel-frequency cepstral coefficients
//!
//! Hamming-windowed frames → power spectrum → triangular log-mel filterbank
//! spanning 0 Hz to Nyquist → DCT-II, keeping the first 13 coefficients and
//! averaging them over all non-silent frames.

use crate::types::MFCC_COEFFICIENTS;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use std::f64::consts::PI;

/// Floor applied to filter energies before the logarithm
const LOG_FLOOR: f64 = 1e-10;

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

/// Triangular mel filterbank over the bins of one FFT size
pub(crate) struct MelFilterbank {
    /// Per filter: (bin, weight) pairs with non-zero weight
    filters: Vec<Vec<(usize, f64)>>,
}

impl MelFilterbank {
    pub(crate) fn new(filter_count: usize, fft_size: usize, sample_rate: u32) -> Self {
        let nyquist = sample_rate as f64 / 2.0;
        let bins = fft_size / 2 + 1;
        let bin_hz = sample_rate as f64 / fft_size as f64;

        let max_mel = hz_to_mel(nyquist);
        let edges: Vec<f64> = (0..filter_count + 2)
            .map(|i| mel_to_hz(max_mel * i as f64 / (filter_count + 1) as f64))
            .collect();

        let filters = (0..filter_count)
            .map(|m| {
                let (low, centre, high) = (edges[m], edges[m + 1], edges[m + 2]);
                (0..bins)
                    .filter_map(|k| {
                        let hz = k as f64 * bin_hz;
                        let weight = if hz > low && hz <= centre {
                            (hz - low) / (centre - low)
                        } else if hz > centre && hz < high {
                            (high - hz) / (high - centre)
                        } else {
                            0.0
                        };
                        (weight > 0.0).then_some((k, weight))
                    })
                    .collect()
            })
            .collect();

        Self { filters }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.filters.len()
    }

    /// Log filter energies of one power spectrum
    pub(crate) fn log_energies(&self, power: &[f64]) -> Vec<f64> {
        self.filters
            .iter()
            .map(|filter| {
                let energy: f64 = filter
                    .iter()
                    .filter_map(|(k, w)| power.get(*k).map(|p| p * w))
                    .sum();
                energy.max(LOG_FLOOR).ln()
            })
            .collect()
    }
}

/// Type-II DCT of `input`, first `count` coefficients
pub(crate) fn dct_ii(input: &[f64], count: usize) -> Vec<f64> {
    let m = input.len() as f64;
    (0..count)
        .map(|n| {
            input
                .iter()
                .enumerate()
                .map(|(i, v)| v * (PI * n as f64 * (i as f64 + 0.5) / m).cos())
                .sum()
        })
        .collect()
}

/// Computes mean MFCCs for a set of frames sharing one length
pub(crate) struct MfccAnalyzer {
    frame_len: usize,
    fft_size: usize,
    window: Vec<f64>,
    filterbank: MelFilterbank,
    planner: FftPlanner<f64>,
}

impl MfccAnalyzer {
    pub(crate) fn new(frame_len: usize, sample_rate: u32, filter_count: usize) -> Self {
        let frame_len = frame_len.max(2);
        let fft_size = frame_len.next_power_of_two();
        let window = (0..frame_len)
            .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (frame_len - 1) as f64).cos())
            .collect();

        Self {
            frame_len,
            fft_size,
            window,
            filterbank: MelFilterbank::new(filter_count, fft_size, sample_rate),
            planner: FftPlanner::new(),
        }
    }

    /// Average coefficients over `frames`; zeros when no frame is given
    pub(crate) fn mean_coefficients(&mut self, frames: &[&[f32]]) -> [f64; MFCC_COEFFICIENTS] {
        let mut sum = [0.0; MFCC_COEFFICIENTS];
        if frames.is_empty() {
            return sum;
        }

        let fft = self.planner.plan_fft_forward(self.fft_size);
        let mut buffer = vec![Complex::new(0.0, 0.0); self.fft_size];

        for frame in frames {
            buffer.iter_mut().for_each(|c| *c = Complex::new(0.0, 0.0));
            for (i, (sample, w)) in frame.iter().zip(&self.window).take(self.frame_len).enumerate() {
                buffer[i] = Complex::new(*sample as f64 * w, 0.0);
            }
            fft.process(&mut buffer);

            let power: Vec<f64> = buffer[..=self.fft_size / 2]
                .iter()
                .map(|c| c.norm_sqr() / self.fft_size as f64)
                .collect();
            let log_energies = self.filterbank.log_energies(&power);
            let coefficients = dct_ii(&log_energies, MFCC_COEFFICIENTS);

            for (acc, c) in sum.iter_mut().zip(coefficients) {
                *acc += c;
            }
        }

        let count = frames.len() as f64;
        sum.iter_mut().for_each(|c| *c /= count);
        sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::tone;

    #[test]
    fn test_mel_scale_roundtrip() {
        for hz in [0.0, 440.0, 1000.0, 8000.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 1e-6);
        }
        assert!((hz_to_mel(1000.0) - 1000.0).abs() < 1.0);
    }

    #[test]
    fn test_filterbank_spans_to_nyquist() {
        let bank = MelFilterbank::new(26, 512, 16_000);
        assert_eq!(bank.len(), 26);

        let last = bank.filters.last().unwrap();
        let highest_bin = last.iter().map(|(k, _)| *k).max().unwrap();
        assert!(highest_bin > 240);
    }

    #[test]
    fn test_dct_of_constant_concentrates_in_first_coefficient() {
        let coefficients = dct_ii(&[2.0; 26], 13);

        assert!((coefficients[0] - 52.0).abs() < 1e-9);
        assert!(coefficients[1..].iter().all(|c| c.abs() < 1e-9));
    }

    #[test]
    fn test_mean_coefficients_are_deterministic() {
        let samples = tone(150.0, 16_000, 0.2, 0.3);
        let frames: Vec<&[f32]> = samples.chunks_exact(400).collect();

        let mut analyzer = MfccAnalyzer::new(400, 16_000, 26);
        let first = analyzer.mean_coefficients(&frames);
        let second = analyzer.mean_coefficients(&frames);

        assert_eq!(first, second);
        assert!(first.iter().all(|c| c.is_finite()));
        assert_eq!(analyzer.mean_coefficients(&[]), [0.0; MFCC_COEFFICIENTS]);
    }
}
