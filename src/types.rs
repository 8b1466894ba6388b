//! Core types for the Neuroscreen pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: per-modality feature vectors, classifier results, and the overall
//! assessment derived from them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Input modality of a screening submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Spiral,
    Voice,
    Posture,
    Questionnaire,
}

impl Modality {
    pub const ALL: [Modality; 4] = [
        Modality::Spiral,
        Modality::Voice,
        Modality::Posture,
        Modality::Questionnaire,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Spiral => "spiral",
            Modality::Voice => "voice",
            Modality::Posture => "posture",
            Modality::Questionnaire => "questionnaire",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity band, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Healthy,
    Mild,
    Moderate,
    Severe,
}

impl Severity {
    /// All bands in ascending severity order
    pub const ALL: [Severity; 4] = [
        Severity::Healthy,
        Severity::Mild,
        Severity::Moderate,
        Severity::Severe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Healthy => "healthy",
            Severity::Mild => "mild",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
        }
    }

    /// Position in [`Severity::ALL`]
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quality flag indicating data issues found during extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    /// Signal carried no usable information (blank image, silence)
    DegenerateSignal,
    /// Fewer than two voiced frames were found
    LowVoicing,
    /// Input was clipped or resampled heavily
    Clipped,
    /// Gait parameters need multi-frame input
    GaitUnavailable,
    /// A keypoint configuration made a geometric index undefined
    DegenerateGeometry,
}

impl QualityFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityFlag::DegenerateSignal => "degenerate_signal",
            QualityFlag::LowVoicing => "low_voicing",
            QualityFlag::Clipped => "clipped",
            QualityFlag::GaitUnavailable => "gait_unavailable",
            QualityFlag::DegenerateGeometry => "degenerate_geometry",
        }
    }
}

/// Features extracted from a photographed spiral drawing, all in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpiralFeatures {
    /// High-frequency edge variation
    pub tremor: f64,
    /// Inconsistency of stroke edge strength
    pub irregularity: f64,
    /// Line thickness / pressure variance
    pub pressure: f64,
    /// Drawing speed proxy (dense edges = slower = lower)
    pub speed: f64,
    /// Inverse of second-derivative roughness
    pub smoothness: f64,
    #[serde(default)]
    pub quality_flags: Vec<QualityFlag>,
}

impl SpiralFeatures {
    /// Feature values for a blank or uniform image
    pub fn degenerate() -> Self {
        Self {
            tremor: 0.0,
            irregularity: 0.0,
            pressure: 0.0,
            speed: 1.0,
            smoothness: 1.0,
            quality_flags: vec![QualityFlag::DegenerateSignal],
        }
    }

    pub fn named_values(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("tremor", self.tremor),
            ("irregularity", self.irregularity),
            ("pressure", self.pressure),
            ("speed", self.speed),
            ("smoothness", self.smoothness),
        ]
    }
}

/// Number of cepstral coefficients kept per voice clip
pub const MFCC_COEFFICIENTS: usize = 13;

/// Features extracted from a voice recording, all non-negative except MFCCs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceFeatures {
    /// Mean cepstral coefficients over non-silent frames
    pub mfcc: [f64; MFCC_COEFFICIENTS],
    /// Relative cycle-to-cycle pitch period variation
    pub jitter: f64,
    /// Relative cycle-to-cycle peak amplitude variation
    pub shimmer: f64,
    /// Harmonic energy / total energy (0-1)
    pub harmonicity: f64,
    /// Harmonic-to-noise ratio (dB, non-negative)
    pub hnr: f64,
    /// Coefficient of variation of voiced f0
    pub f0_variation: f64,
    /// Spectral centroid (Hz)
    pub spectral_centroid: f64,
    /// 85% spectral rolloff (Hz)
    pub spectral_rolloff: f64,
    /// Zero crossings per sample
    pub zero_crossing_rate: f64,
    /// Mean f0 over voiced frames (Hz), 0 when unvoiced
    #[serde(default)]
    pub mean_f0_hz: f64,
    /// Number of frames with a detected pitch
    #[serde(default)]
    pub voiced_frames: usize,
    #[serde(default)]
    pub quality_flags: Vec<QualityFlag>,
}

impl VoiceFeatures {
    /// Feature values for empty or silent audio
    pub fn degenerate() -> Self {
        Self {
            mfcc: [0.0; MFCC_COEFFICIENTS],
            jitter: 0.0,
            shimmer: 0.0,
            harmonicity: 0.0,
            hnr: 0.0,
            f0_variation: 0.0,
            spectral_centroid: 0.0,
            spectral_rolloff: 0.0,
            zero_crossing_rate: 0.0,
            mean_f0_hz: 0.0,
            voiced_frames: 0,
            quality_flags: vec![QualityFlag::DegenerateSignal],
        }
    }

    /// Scalar features (MFCCs are reported separately)
    pub fn named_values(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("jitter", self.jitter),
            ("shimmer", self.shimmer),
            ("harmonicity", self.harmonicity),
            ("hnr", self.hnr),
            ("f0_variation", self.f0_variation),
            ("spectral_centroid", self.spectral_centroid),
            ("spectral_rolloff", self.spectral_rolloff),
            ("zero_crossing_rate", self.zero_crossing_rate),
        ]
    }
}

/// Gait estimates derived from a keypoint sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaitParameters {
    /// Mean peak ankle separation divided by body height
    pub step_length: f64,
    /// Steps per minute
    pub cadence: f64,
    /// Mean duration an ankle stays lifted off the ground (seconds)
    pub swing_time: f64,
}

/// Features extracted from posture keypoints, indices in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostureFeatures {
    pub forward_head_posture: f64,
    pub shoulder_asymmetry: f64,
    pub spinal_curvature: f64,
    pub arm_swing_asymmetry: f64,
    pub body_rigidity: f64,
    pub balance_index: f64,
    /// Present only for multi-frame input
    pub gait_parameters: Option<GaitParameters>,
    #[serde(default)]
    pub quality_flags: Vec<QualityFlag>,
}

impl PostureFeatures {
    pub fn named_values(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("forward_head_posture", self.forward_head_posture),
            ("shoulder_asymmetry", self.shoulder_asymmetry),
            ("spinal_curvature", self.spinal_curvature),
            ("arm_swing_asymmetry", self.arm_swing_asymmetry),
            ("body_rigidity", self.body_rigidity),
            ("balance_index", self.balance_index),
        ]
    }
}

/// Modality-tagged feature vector handed to a classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "modality", content = "features", rename_all = "snake_case")]
pub enum FeatureVector {
    Spiral(SpiralFeatures),
    Voice(VoiceFeatures),
    Posture(PostureFeatures),
}

impl FeatureVector {
    pub fn modality(&self) -> Modality {
        match self {
            FeatureVector::Spiral(_) => Modality::Spiral,
            FeatureVector::Voice(_) => Modality::Voice,
            FeatureVector::Posture(_) => Modality::Posture,
        }
    }

    pub fn named_values(&self) -> Vec<(&'static str, f64)> {
        match self {
            FeatureVector::Spiral(f) => f.named_values(),
            FeatureVector::Voice(f) => f.named_values(),
            FeatureVector::Posture(f) => f.named_values(),
        }
    }

    pub fn quality_flags(&self) -> &[QualityFlag] {
        match self {
            FeatureVector::Spiral(f) => &f.quality_flags,
            FeatureVector::Voice(f) => &f.quality_flags,
            FeatureVector::Posture(f) => &f.quality_flags,
        }
    }

    /// Human-readable enumeration of the feature values (3 decimal places)
    pub fn details(&self) -> String {
        let mut parts: Vec<String> = self
            .named_values()
            .iter()
            .map(|(name, value)| format!("{name}: {value:.3}"))
            .collect();

        match self {
            FeatureVector::Voice(f) => {
                let mfcc: Vec<String> = f.mfcc.iter().map(|c| format!("{c:.3}")).collect();
                parts.push(format!("mfcc: [{}]", mfcc.join(", ")));
            }
            FeatureVector::Posture(f) => match &f.gait_parameters {
                Some(gait) => parts.push(format!(
                    "step_length: {:.3}; cadence: {:.3}; swing_time: {:.3}",
                    gait.step_length, gait.cadence, gait.swing_time
                )),
                None => parts.push("gait: unavailable".to_string()),
            },
            FeatureVector::Spiral(_) => {}
        }

        parts.join("; ")
    }
}

/// Result of assessing a single modality
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentResult {
    /// 0-100, higher is healthier
    pub score: u8,
    /// 0-100
    pub confidence: u8,
    pub status: Severity,
    /// Explanation derived solely from the features that produced the result
    pub details: String,
}

/// Overall assessment combined from all present modality results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverallAssessment {
    pub score: u8,
    pub confidence: u8,
    pub status: Severity,
    pub recommendation: String,
    /// Modalities that contributed, in modality order
    pub modalities: Vec<Modality>,
    /// True when the worst individual status overrode the mean-derived status
    pub escalated: bool,
}

/// Versioned JSON report of a session snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentReport {
    pub report_version: String,
    pub producer: ReportProducer,
    pub provenance: ReportProvenance,
    /// Calibration the features and classifier ran with
    pub calibration_version: String,
    /// Name of the classifier model
    pub classifier: String,
    /// One entry per present modality, in modality order
    pub modalities: Vec<ModalityReport>,
    /// Absent when no modality has been submitted
    pub overall: Option<OverallAssessment>,
}

/// Software that produced a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Where and when a report was computed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProvenance {
    pub session_id: String,
    pub session_created_at_utc: String,
    pub computed_at_utc: String,
}

/// Report entry for one modality
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalityReport {
    pub modality: Modality,
    /// Description of the raw input (never its content)
    pub input: String,
    pub submitted_at_utc: String,
    pub features: Option<FeatureVector>,
    pub result: AssessmentResult,
    pub quality_flags: Vec<String>,
}
