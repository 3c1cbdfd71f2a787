//! Error types for the extraction engine

use thiserror::Error;

use crate::models::AcquisitionAttempt;

/// Extraction error taxonomy
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// Every locator strategy (and the option scan) came up empty.
    #[error("Control not found for '{field}' (tried: {})", .attempted.join(", "))]
    ControlNotFound {
        field: String,
        attempted: Vec<String>,
    },

    #[error("Filter '{field}' could not be set to '{wanted}'")]
    FilterNotApplied { field: String, wanted: String },

    #[error("Report never became ready after {attempts} date format candidates")]
    ReadinessTimeout { attempts: usize },

    #[error("Every acquisition strategy failed ({} attempts)", .attempts.len())]
    AcquisitionExhausted { attempts: Vec<AcquisitionAttempt> },

    #[error("Invalid site profile: {0}")]
    InvalidProfile(String),

    #[error("Browser error: {0}")]
    Browser(#[from] anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractionError {
    /// Short machine-readable kind for run reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractionError::ControlNotFound { .. } => "control_not_found",
            ExtractionError::FilterNotApplied { .. } => "filter_not_applied",
            ExtractionError::ReadinessTimeout { .. } => "readiness_timeout",
            ExtractionError::AcquisitionExhausted { .. } => "acquisition_exhausted",
            ExtractionError::InvalidProfile(_) => "invalid_profile",
            ExtractionError::Browser(_) => "browser",
            ExtractionError::Io(_) => "io",
        }
    }
}

/// Result type alias for extraction operations
pub type Result<T> = std::result::Result<T, ExtractionError>;
