//! Error types for Neuroscreen

use thiserror::Error;

/// Errors that can occur while extracting, classifying or aggregating
#[derive(Debug, Error)]
pub enum ScreeningError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Degenerate signal: {0}")]
    DegenerateSignal(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Extraction timed out after {0} ms")]
    Timeout(u64),

    #[error("Session was reset while the submission was in flight")]
    SessionReset,

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Extraction task failed: {0}")]
    TaskFailed(String),
}

impl ScreeningError {
    /// Short machine-readable code for UI and FFI consumers
    pub fn code(&self) -> &'static str {
        match self {
            ScreeningError::InvalidInput(_) => "INVALID_INPUT",
            ScreeningError::DegenerateSignal(_) => "DEGENERATE_SIGNAL",
            ScreeningError::ModelUnavailable(_) => "MODEL_UNAVAILABLE",
            ScreeningError::Timeout(_) => "TIMEOUT",
            ScreeningError::SessionReset => "SESSION_RESET",
            ScreeningError::JsonError(_) => "JSON_ERROR",
            ScreeningError::ConfigError(_) => "CONFIG_ERROR",
            ScreeningError::TaskFailed(_) => "TASK_FAILED",
        }
    }
}
