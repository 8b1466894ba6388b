//! Signal extractors: raw modality input → named feature vectors
//!
//! Each extractor is a plain struct holding its calibration section of
//! [`ScreeningConfig`](crate::config::ScreeningConfig). Extraction is
//! deterministic and never uses randomness.

mod imaging;
pub mod posture;
pub mod spiral;
pub mod voice;

pub use posture::{FrameSize, KeypointDetector, Keypoints, Point, PostureExtractor};
pub use spiral::SpiralExtractor;
pub use voice::{decode_wav, DecodedAudio, VoiceExtractor};
