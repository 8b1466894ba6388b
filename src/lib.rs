//! Neuroscreen - On-device multi-modal screening engine
//!
//! Neuroscreen turns a spiral drawing photograph, a sustained-vowel voice
//! recording, a posture photograph or keypoint sequence and a symptom
//! questionnaire into per-modality assessments, then combines whatever is
//! present into one overall status through a deterministic pipeline:
//! decoding → feature extraction → classification → aggregation → report encoding.
//!
//! Results are screening aids produced by an uncalibrated reference classifier,
//! not diagnoses.
//!
//! ## Modules
//!
//! - **Extractors**: spiral image, voice and posture feature extraction
//! - **Classifier**: feature vector → class probabilities → score
//! - **Questionnaire**: rule-based symptom scoring
//! - **Aggregator**: overall status with worst-case escalation
//! - **Session / Service**: per-user state, sync and async submission

pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod encoder;
pub mod error;
pub mod extractors;
pub mod pipeline;
pub mod questionnaire;
pub mod service;
pub mod session;
pub mod synthetic;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use classifier::{Classifier, ReferenceClassifier, ScorePlacement};
pub use config::{ScreeningConfig, CALIBRATION_VERSION};
pub use encoder::ReportEncoder;
pub use error::ScreeningError;
pub use extractors::{FrameSize, KeypointDetector, Keypoints, Point};
pub use pipeline::{
    questionnaire_to_assessment, spiral_to_assessment, voice_to_assessment, Screener,
};
pub use questionnaire::SymptomQuestionnaire;
pub use service::ScreeningService;
pub use session::{AssessmentSession, Submission};
pub use types::{AssessmentResult, FeatureVector, Modality, OverallAssessment, Severity};

/// Neuroscreen version embedded in every report
pub const NEUROSCREEN_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "neuroscreen";
