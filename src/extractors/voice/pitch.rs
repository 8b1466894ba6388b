//! Frame-level pitch and amplitude tracking
//!
//! Pitch periods come from the normalized autocorrelation of each frame restricted
//! to a physiologically plausible lag range. Jitter and shimmer are the mean
//! relative difference between consecutive frame measurements.

const EPSILON: f64 = 1e-12;

/// Fraction of the global autocorrelation maximum a shorter lag must reach to win.
/// Prefers the fundamental over its sub-harmonics, whose correlation is nearly equal.
const OCTAVE_PREFERENCE: f64 = 0.9;

/// Per-frame measurements for one clip
#[derive(Debug, Clone, Default)]
pub(crate) struct FrameTrack {
    /// Pitch period in seconds, `None` for unvoiced or silent frames
    pub periods: Vec<Option<f64>>,
    /// Peak absolute amplitude, `None` for silent frames
    pub peaks: Vec<Option<f64>>,
}

impl FrameTrack {
    pub(crate) fn voiced_f0(&self) -> Vec<f64> {
        self.periods
            .iter()
            .flatten()
            .filter(|p| **p > 0.0)
            .map(|p| 1.0 / p)
            .collect()
    }

    pub(crate) fn jitter(&self) -> f64 {
        relative_perturbation(&self.periods)
    }

    pub(crate) fn shimmer(&self) -> f64 {
        relative_perturbation(&self.peaks)
    }
}

/// Lag search window for pitch estimation
#[derive(Debug, Clone, Copy)]
pub(crate) struct PitchSearch {
    pub sample_rate: f64,
    pub min_lag: usize,
    pub max_lag: usize,
    pub voicing_threshold: f64,
    pub silence_rms: f64,
}

impl PitchSearch {
    pub(crate) fn new(
        sample_rate: u32,
        min_f0_hz: f64,
        max_f0_hz: f64,
        voicing_threshold: f64,
        silence_rms: f64,
    ) -> Self {
        let sr = sample_rate as f64;
        Self {
            sample_rate: sr,
            min_lag: ((sr / max_f0_hz).floor() as usize).max(1),
            max_lag: (sr / min_f0_hz).ceil() as usize,
            voicing_threshold,
            silence_rms,
        }
    }
}

/// Split samples into frames of `frame_len` advancing by `hop`.
/// A clip shorter than one frame yields a single short frame.
pub(crate) fn frames(samples: &[f32], frame_len: usize, hop: usize) -> Vec<&[f32]> {
    if samples.is_empty() || frame_len == 0 || hop == 0 {
        return Vec::new();
    }
    if samples.len() <= frame_len {
        return vec![samples];
    }

    let mut out = Vec::with_capacity((samples.len() - frame_len) / hop + 1);
    let mut start = 0;
    while start + frame_len <= samples.len() {
        out.push(&samples[start..start + frame_len]);
        start += hop;
    }
    out
}

/// Track pitch period and peak amplitude over every frame
pub(crate) fn track(frames: &[&[f32]], search: &PitchSearch) -> FrameTrack {
    let mut result = FrameTrack {
        periods: Vec::with_capacity(frames.len()),
        peaks: Vec::with_capacity(frames.len()),
    };

    for frame in frames {
        if rms(frame) < search.silence_rms {
            result.periods.push(None);
            result.peaks.push(None);
            continue;
        }
        let peak = frame.iter().map(|s| s.abs() as f64).fold(0.0, f64::max);
        result.peaks.push(Some(peak));
        result.periods.push(estimate_period(frame, search));
    }

    result
}

pub(crate) fn rms(frame: &[f32]) -> f64 {
    if frame.is_empty() {
        return 0.0;
    }
    let energy: f64 = frame.iter().map(|s| (*s as f64) * (*s as f64)).sum();
    (energy / frame.len() as f64).sqrt()
}

/// Estimate the pitch period (seconds) of a frame, `None` when unvoiced
pub(crate) fn estimate_period(frame: &[f32], search: &PitchSearch) -> Option<f64> {
    let n = frame.len();
    if n < 4 {
        return None;
    }

    let mean = frame.iter().map(|s| *s as f64).sum::<f64>() / n as f64;
    let x: Vec<f64> = frame.iter().map(|s| *s as f64 - mean).collect();

    let max_lag = search.max_lag.min(n - 2);
    let min_lag = search.min_lag;
    if min_lag >= max_lag {
        return None;
    }

    // Correlation for lags min_lag-1 ..= max_lag+1 so every candidate has two neighbours
    let first = min_lag.saturating_sub(1).max(1);
    let last = (max_lag + 1).min(n - 1);
    let correlations: Vec<f64> = (first..=last).map(|lag| normalized_autocorrelation(&x, lag)).collect();
    let r = |lag: usize| correlations[lag - first];

    let candidates: Vec<usize> = (min_lag.max(first + 1)..=max_lag.min(last - 1))
        .filter(|&lag| r(lag) >= r(lag - 1) && r(lag) >= r(lag + 1))
        .collect();

    let best = candidates.iter().map(|&lag| r(lag)).fold(f64::MIN, f64::max);
    if best < search.voicing_threshold {
        return None;
    }

    let lag = candidates
        .into_iter()
        .find(|&lag| r(lag) >= best * OCTAVE_PREFERENCE)?;

    // Parabolic interpolation around the chosen peak
    let (left, centre, right) = (r(lag - 1), r(lag), r(lag + 1));
    let denominator = left - 2.0 * centre + right;
    let offset = if denominator.abs() > EPSILON {
        (0.5 * (left - right) / denominator).clamp(-0.5, 0.5)
    } else {
        0.0
    };

    Some((lag as f64 + offset) / search.sample_rate)
}

fn normalized_autocorrelation(x: &[f64], lag: usize) -> f64 {
    if lag >= x.len() {
        return 0.0;
    }
    let head = &x[..x.len() - lag];
    let tail = &x[lag..];

    let numerator: f64 = head.iter().zip(tail).map(|(a, b)| a * b).sum();
    let head_energy: f64 = head.iter().map(|a| a * a).sum();
    let tail_energy: f64 = tail.iter().map(|b| b * b).sum();
    let denominator = (head_energy * tail_energy).sqrt();

    if denominator > EPSILON {
        numerator / denominator
    } else {
        0.0
    }
}

/// Mean of |aᵢ − aᵢ₋₁| / mean(aᵢ, aᵢ₋₁) over consecutive frames where both are present
pub(crate) fn relative_perturbation(values: &[Option<f64>]) -> f64 {
    let mut total = 0.0;
    let mut pairs = 0usize;

    for window in values.windows(2) {
        if let [Some(previous), Some(current)] = window {
            let mean = (previous + current) / 2.0;
            if mean > EPSILON {
                total += (current - previous).abs() / mean;
                pairs += 1;
            }
        }
    }

    if pairs == 0 {
        0.0
    } else {
        total / pairs as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::tone;

    fn search(sample_rate: u32) -> PitchSearch {
        PitchSearch::new(sample_rate, 50.0, 500.0, 0.5, 1e-4)
    }

    #[test]
    fn test_pure_tone_period() {
        let samples = tone(200.0, 16_000, 0.05, 0.5);
        let period = estimate_period(&samples[..400], &search(16_000)).unwrap();

        assert!((1.0 / period - 200.0).abs() < 2.0);
    }

    #[test]
    fn test_non_integer_period_is_interpolated() {
        let samples = tone(173.0, 16_000, 0.05, 0.5);
        let period = estimate_period(&samples[..400], &search(16_000)).unwrap();

        assert!((1.0 / period - 173.0).abs() < 2.0);
    }

    #[test]
    fn test_silence_is_unvoiced() {
        let samples = vec![0.0f32; 400];
        assert!(estimate_period(&samples, &search(16_000)).is_none());

        let framed = frames(&samples, 400, 160);
        let tracked = track(&framed, &search(16_000));
        assert_eq!(tracked.jitter(), 0.0);
        assert_eq!(tracked.shimmer(), 0.0);
    }

    #[test]
    fn test_frames_cover_clip() {
        let samples = vec![0.1f32; 1000];
        let framed = frames(&samples, 400, 160);

        assert_eq!(framed.len(), 4);
        assert!(framed.iter().all(|f| f.len() == 400));
        assert_eq!(frames(&samples[..100], 400, 160).len(), 1);
        assert!(frames(&[], 400, 160).is_empty());
    }

    #[test]
    fn test_relative_perturbation_skips_gaps() {
        let values = vec![Some(1.0), Some(1.2), None, Some(5.0), Some(5.0)];
        let expected = (0.2 / 1.1) / 2.0;

        assert!((relative_perturbation(&values) - expected).abs() < 1e-12);
        assert_eq!(relative_perturbation(&[None, None]), 0.0);
        assert_eq!(relative_perturbation(&[]), 0.0);
    }
}
