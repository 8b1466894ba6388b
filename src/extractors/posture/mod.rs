//! Posture feature extraction
//!
//! Posture indices are planar geometry over 13 body keypoints. Keypoints come
//! from a [`KeypointDetector`] (the swap point for a pose model) or are
//! supplied directly with the frame size. A single frame never yields gait
//! parameters; a keypoint sequence with a frame rate does.

mod gait;
mod keypoints;

pub use keypoints::{angle_at, perpendicular_distance, FrameSize, Keypoints, Point};

use crate::config::PostureConfig;
use crate::error::ScreeningError;
use crate::extractors::imaging::{decode_image, ensure_non_empty};
use crate::types::{GaitParameters, PostureFeatures, QualityFlag};
use image::DynamicImage;

/// Minimum wrist excursion (pixels) for sequence-based arm swing comparison
const MIN_ARM_EXCURSION_PX: f64 = 1.0;

/// Upstream pose model producing keypoints from an image
pub trait KeypointDetector: Send + Sync {
    /// Detector identifier
    fn name(&self) -> &str;

    /// Locate the 13 body keypoints in an image
    fn detect(&self, image: &DynamicImage) -> Result<Keypoints, ScreeningError>;
}

/// The six posture indices of one frame
#[derive(Debug, Clone, Default)]
struct PostureIndices {
    forward_head_posture: f64,
    shoulder_asymmetry: f64,
    spinal_curvature: f64,
    arm_swing_asymmetry: f64,
    body_rigidity: f64,
    balance_index: f64,
}

/// Extractor for posture photographs and keypoint sequences
#[derive(Debug, Clone, Default)]
pub struct PostureExtractor {
    config: PostureConfig,
}

impl PostureExtractor {
    pub fn new(config: PostureConfig) -> Self {
        Self { config }
    }

    /// Decode a photograph, detect keypoints and extract posture features
    pub fn extract_image(
        &self,
        bytes: &[u8],
        detector: Option<&dyn KeypointDetector>,
    ) -> Result<PostureFeatures, ScreeningError> {
        let detector = detector.ok_or_else(|| {
            ScreeningError::ModelUnavailable("no keypoint detector is configured".to_string())
        })?;
        let image = decode_image(bytes)?;
        self.extract_decoded(&image, detector)
    }

    /// Detect keypoints on an already-decoded image
    pub fn extract_decoded(
        &self,
        image: &DynamicImage,
        detector: &dyn KeypointDetector,
    ) -> Result<PostureFeatures, ScreeningError> {
        ensure_non_empty(image)?;
        let keypoints = detector.detect(image)?;
        log::debug!("Keypoints detected by {}", detector.name());
        self.extract_keypoints(&keypoints, FrameSize::new(image.width(), image.height()))
    }

    /// Extract posture features from one frame of keypoints
    pub fn extract_keypoints(
        &self,
        keypoints: &Keypoints,
        frame: FrameSize,
    ) -> Result<PostureFeatures, ScreeningError> {
        keypoints.validate(frame)?;

        let mut flags = Vec::new();
        let indices = self.frame_indices(keypoints, frame, &mut flags);
        flags.push(QualityFlag::GaitUnavailable);

        Ok(into_features(indices, None, flags))
    }

    /// Extract posture features from a walking sequence captured at `fps`
    pub fn extract_sequence(
        &self,
        frames: &[Keypoints],
        frame: FrameSize,
        fps: f64,
    ) -> Result<PostureFeatures, ScreeningError> {
        if frames.is_empty() {
            return Err(ScreeningError::InvalidInput(
                "Keypoint sequence is empty".to_string(),
            ));
        }
        if !fps.is_finite() || fps <= 0.0 {
            return Err(ScreeningError::InvalidInput(format!(
                "Frame rate must be positive, got {fps}"
            )));
        }
        for keypoints in frames {
            keypoints.validate(frame)?;
        }

        let mut flags = Vec::new();
        let per_frame: Vec<PostureIndices> = frames
            .iter()
            .map(|k| self.frame_indices(k, frame, &mut flags))
            .collect();

        let n = per_frame.len() as f64;
        let mean = |f: fn(&PostureIndices) -> f64| per_frame.iter().map(f).sum::<f64>() / n;
        let mut indices = PostureIndices {
            forward_head_posture: mean(|i| i.forward_head_posture),
            shoulder_asymmetry: mean(|i| i.shoulder_asymmetry),
            spinal_curvature: mean(|i| i.spinal_curvature),
            arm_swing_asymmetry: mean(|i| i.arm_swing_asymmetry),
            body_rigidity: mean(|i| i.body_rigidity),
            balance_index: mean(|i| i.balance_index),
        };
        if let Some(asymmetry) = wrist_excursion_asymmetry(frames) {
            indices.arm_swing_asymmetry = asymmetry;
        }

        let gait = gait::estimate(frames, fps, self.config.min_gait_frames);
        if gait.is_none() {
            flags.push(QualityFlag::GaitUnavailable);
        }

        log::debug!(
            "Posture sequence: {} frames at {:.1} fps, gait {}",
            frames.len(),
            fps,
            if gait.is_some() { "estimated" } else { "unavailable" }
        );

        Ok(into_features(indices, gait, flags))
    }

    fn frame_indices(
        &self,
        k: &Keypoints,
        frame: FrameSize,
        flags: &mut Vec<QualityFlag>,
    ) -> PostureIndices {
        let mut degenerate = false;
        let shoulder_mid = k.shoulder_mid();
        let hip_mid = k.hip_mid();
        let shoulder_width = k.shoulder_width();
        let has_width = shoulder_width > f64::EPSILON;

        let forward_head_posture = match angle_at(&shoulder_mid, &k.nose, &k.right_shoulder) {
            Some(angle) => clamp01((angle - 90.0).abs() / 90.0),
            None => {
                degenerate = true;
                0.0
            }
        };

        let (shoulder_asymmetry, balance_index) = if has_width {
            let tilt = (k.left_shoulder.y - k.right_shoulder.y).abs() / shoulder_width;
            let sway = (hip_mid.x - k.ankle_mid().x).abs() / shoulder_width;
            (
                clamp01(tilt * self.config.shoulder_asymmetry_scale),
                clamp01(sway * self.config.balance_scale),
            )
        } else {
            degenerate = true;
            (0.0, 0.0)
        };

        let spinal_curvature = match perpendicular_distance(&shoulder_mid, &k.nose, &hip_mid) {
            Some(offset) => {
                clamp01(offset / frame.height as f64 * self.config.spinal_curvature_scale)
            }
            None => {
                degenerate = true;
                0.0
            }
        };

        let (left_elbow, right_elbow) = (k.left_elbow_angle(), k.right_elbow_angle());
        let arm_swing_asymmetry = match (left_elbow, right_elbow) {
            (Some(l), Some(r)) => clamp01((l - r).abs() / 180.0),
            _ => {
                degenerate = true;
                0.0
            }
        };

        let angles: Vec<f64> = [left_elbow, right_elbow, k.left_knee_angle(), k.right_knee_angle()]
            .into_iter()
            .flatten()
            .collect();
        let body_rigidity = if angles.len() >= 2 {
            let mean = angles.iter().sum::<f64>() / angles.len() as f64;
            let variance =
                angles.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / angles.len() as f64;
            1.0 / (1.0 + variance / self.config.rigidity_variance_norm)
        } else {
            degenerate = true;
            0.0
        };

        if degenerate && !flags.contains(&QualityFlag::DegenerateGeometry) {
            log::warn!("Degenerate keypoint geometry; affected posture indices set to 0");
            flags.push(QualityFlag::DegenerateGeometry);
        }

        PostureIndices {
            forward_head_posture,
            shoulder_asymmetry,
            spinal_curvature,
            arm_swing_asymmetry,
            body_rigidity,
            balance_index,
        }
    }
}

/// |left − right| / max over the horizontal wrist excursion relative to the shoulders
fn wrist_excursion_asymmetry(frames: &[Keypoints]) -> Option<f64> {
    let excursion = |offset: fn(&Keypoints) -> f64| {
        let (lo, hi) = frames
            .iter()
            .map(offset)
            .fold((f64::MAX, f64::MIN), |(lo, hi), x| (lo.min(x), hi.max(x)));
        hi - lo
    };
    let left = excursion(|k| k.left_wrist.x - k.shoulder_mid().x);
    let right = excursion(|k| k.right_wrist.x - k.shoulder_mid().x);

    let larger = left.max(right);
    if larger < MIN_ARM_EXCURSION_PX {
        return None;
    }
    Some(clamp01((left - right).abs() / larger))
}

fn into_features(
    indices: PostureIndices,
    gait_parameters: Option<GaitParameters>,
    quality_flags: Vec<QualityFlag>,
) -> PostureFeatures {
    PostureFeatures {
        forward_head_posture: indices.forward_head_posture,
        shoulder_asymmetry: indices.shoulder_asymmetry,
        spinal_curvature: indices.spinal_curvature,
        arm_swing_asymmetry: indices.arm_swing_asymmetry,
        body_rigidity: indices.body_rigidity,
        balance_index: indices.balance_index,
        gait_parameters,
        quality_flags,
    }
}

fn clamp01(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
