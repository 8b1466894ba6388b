//! Gait estimation from a keypoint sequence
//!
//! Each local maximum of the horizontal ankle separation is one step. Cadence
//! comes from the spacing of those maxima, step length from their height
//! (normalized by body height), and swing time from runs of frames where an
//! ankle is lifted clear of its ground level.

use super::keypoints::{Keypoints, Point};
use crate::types::GaitParameters;

const EPSILON: f64 = 1e-9;

/// Lift (as a fraction of body height) above which an ankle counts as off the ground
const LIFT_FRACTION: f64 = 0.02;

/// Estimate gait parameters; `None` when the sequence is too short or shows fewer
/// than two steps.
pub(crate) fn estimate(frames: &[Keypoints], fps: f64, min_frames: usize) -> Option<GaitParameters> {
    if frames.len() < min_frames.max(3) || !(fps > 0.0) {
        return None;
    }

    let body_height = frames.iter().map(Keypoints::body_height).sum::<f64>() / frames.len() as f64;
    if body_height < EPSILON {
        return None;
    }

    let separation: Vec<f64> = frames
        .iter()
        .map(|k| (k.left_ankle.x - k.right_ankle.x).abs())
        .collect();
    let peaks = step_peaks(&separation);
    if peaks.len() < 2 {
        log::debug!("Gait: {} step peak(s) in {} frames, not enough", peaks.len(), frames.len());
        return None;
    }

    let mean_interval = (peaks[peaks.len() - 1] - peaks[0]) as f64 / (peaks.len() - 1) as f64;
    let cadence = 60.0 * fps / mean_interval;
    let step_length =
        peaks.iter().map(|&t| separation[t]).sum::<f64>() / peaks.len() as f64 / body_height;

    let threshold = LIFT_FRACTION * body_height;
    let mut runs = lifted_runs(frames.iter().map(|k| k.left_ankle), threshold);
    runs.extend(lifted_runs(frames.iter().map(|k| k.right_ankle), threshold));
    let swing_time = if runs.is_empty() {
        0.0
    } else {
        runs.iter().sum::<usize>() as f64 / runs.len() as f64 / fps
    };

    Some(GaitParameters {
        step_length,
        cadence,
        swing_time,
    })
}

/// Indices of local maxima above the mean; plateaus count once
fn step_peaks(signal: &[f64]) -> Vec<usize> {
    if signal.len() < 3 {
        return Vec::new();
    }
    let mean = signal.iter().sum::<f64>() / signal.len() as f64;

    (1..signal.len() - 1)
        .filter(|&t| signal[t] > signal[t - 1] && signal[t] >= signal[t + 1] && signal[t] > mean)
        .collect()
}

/// Lengths of complete runs where the ankle sits above its lowest (ground) position
fn lifted_runs(ankle: impl Iterator<Item = Point> + Clone, threshold: f64) -> Vec<usize> {
    let ground = ankle.clone().map(|p| p.y).fold(f64::MIN, f64::max);

    let mut runs = Vec::new();
    let mut current = 0usize;
    let mut started_on_ground = false;
    for point in ankle {
        if ground - point.y > threshold {
            current += 1;
        } else {
            // Runs cut by the start of the clip are partial and not counted
            if current > 0 && started_on_ground {
                runs.push(current);
            }
            current = 0;
            started_on_ground = true;
        }
    }
    runs
}
