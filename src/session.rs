//! Assessment session: the in-memory record of one user's screening
//!
//! A session holds at most one record per modality. Resubmitting a modality
//! replaces its record; `reset` clears everything and bumps the generation
//! counter so that work started before the reset can be recognised as stale.
//! Sessions are never persisted.

use crate::extractors::posture::{FrameSize, Keypoints};
use crate::questionnaire::SymptomQuestionnaire;
use crate::types::{AssessmentResult, FeatureVector, Modality};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Raw input for one modality
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Encoded spiral drawing photograph
    SpiralImage(Vec<u8>),
    /// WAV recording
    VoiceWav(Vec<u8>),
    /// Mono PCM samples in [-1.0, 1.0]
    VoiceSamples { samples: Vec<f32>, sample_rate: u32 },
    /// Encoded posture photograph (needs a keypoint detector)
    PostureImage(Vec<u8>),
    /// One frame of keypoints
    PostureKeypoints { keypoints: Keypoints, frame: FrameSize },
    /// Walking sequence of keypoints
    PostureSequence {
        frames: Vec<Keypoints>,
        frame: FrameSize,
        fps: f64,
    },
    Questionnaire(SymptomQuestionnaire),
}

impl Submission {
    pub fn modality(&self) -> Modality {
        match self {
            Submission::SpiralImage(_) => Modality::Spiral,
            Submission::VoiceWav(_) | Submission::VoiceSamples { .. } => Modality::Voice,
            Submission::PostureImage(_)
            | Submission::PostureKeypoints { .. }
            | Submission::PostureSequence { .. } => Modality::Posture,
            Submission::Questionnaire(_) => Modality::Questionnaire,
        }
    }

    /// Short description of the input, without its content
    pub fn describe(&self) -> String {
        match self {
            Submission::SpiralImage(bytes) => format!("image, {} bytes", bytes.len()),
            Submission::VoiceWav(bytes) => format!("wav, {} bytes", bytes.len()),
            Submission::VoiceSamples {
                samples,
                sample_rate,
            } => format!("pcm, {} samples at {} Hz", samples.len(), sample_rate),
            Submission::PostureImage(bytes) => format!("image, {} bytes", bytes.len()),
            Submission::PostureKeypoints { frame, .. } => {
                format!("keypoints, {}x{} frame", frame.width, frame.height)
            }
            Submission::PostureSequence { frames, fps, .. } => {
                format!("keypoint sequence, {} frames at {:.1} fps", frames.len(), fps)
            }
            Submission::Questionnaire(_) => "questionnaire".to_string(),
        }
    }
}

/// Latest submission and result for one modality
#[derive(Debug, Clone)]
pub struct ModalityRecord {
    pub modality: Modality,
    pub input: Submission,
    /// Absent for the questionnaire, which has no feature extraction
    pub features: Option<FeatureVector>,
    pub result: AssessmentResult,
    pub submitted_at: DateTime<Utc>,
}

/// One user's screening session
#[derive(Debug, Clone)]
pub struct AssessmentSession {
    id: Uuid,
    created_at: DateTime<Utc>,
    generation: u64,
    records: BTreeMap<Modality, ModalityRecord>,
}

impl Default for AssessmentSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AssessmentSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            generation: 0,
            records: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Incremented by every reset
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Store a record, returning the one it replaces
    pub fn store(&mut self, record: ModalityRecord) -> Option<ModalityRecord> {
        log::debug!("Session {}: storing {} result", self.id, record.modality);
        self.records.insert(record.modality, record)
    }

    pub fn record(&self, modality: Modality) -> Option<&ModalityRecord> {
        self.records.get(&modality)
    }

    /// Records in modality order
    pub fn records(&self) -> impl Iterator<Item = &ModalityRecord> {
        self.records.values()
    }

    /// Current result per present modality
    pub fn results(&self) -> BTreeMap<Modality, AssessmentResult> {
        self.records
            .iter()
            .map(|(modality, record)| (*modality, record.result.clone()))
            .collect()
    }

    /// Clear every record
    pub fn reset(&mut self) {
        log::debug!(
            "Session {}: reset, dropping {} record(s)",
            self.id,
            self.records.len()
        );
        self.records.clear();
        self.generation += 1;
    }
}
