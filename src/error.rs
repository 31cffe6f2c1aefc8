//! Error Taxonomy
//!
//! Three caller-visible categories, kept distinct on purpose:
//! - `ValidationError`: recoverable at the boundary, carries a
//!   human-readable reason, never silently coerced.
//! - `SddError::ModelNotReady`: predict before train/load, fatal for
//!   that call only.
//! - `ArtifactError`: fatal at startup, surfaced by the loading path.
//!
//! Numeric degeneracy (zero-variance batches, empty windows) is absorbed
//! internally with epsilon guards and never appears here.

use thiserror::Error;

/// Input validation failure at the serving boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("need at least 2 readings, got {0}")]
    TooFewReadings(usize),

    #[error("readings must be in chronological order (reading {index} precedes its predecessor)")]
    OutOfOrder { index: usize },

    #[error("duplicate timestamp at reading {index}: {timestamp}")]
    DuplicateTimestamp { index: usize, timestamp: String },

    #[error("need at least {required:.1} hours of data, got {actual:.1} hours")]
    InsufficientSpan { required: f64, actual: f64 },
}

/// Trained-artifact failure. Fatal to serving, raised at load time.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact file not found: {0}")]
    NotFound(String),

    #[error("failed to read artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact checksum mismatch (expected {expected:08x}, got {actual:08x})")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("artifact is corrupt or truncated: {0}")]
    Corrupt(String),

    #[error("artifact is incomplete: {0}")]
    Incomplete(&'static str),

    #[error("artifact shape mismatch: {0}")]
    ShapeMismatch(String),
}

/// Top-level pipeline error.
#[derive(Debug, Error)]
pub enum SddError {
    #[error("invalid rolling window: {0}")]
    Validation(#[from] ValidationError),

    #[error("model not ready: {0} (train or load artifacts first)")]
    ModelNotReady(&'static str),

    #[error("training data too short: need at least {required} rows, got {actual}")]
    TrainingDataTooShort { required: usize, actual: usize },

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

pub type Result<T> = std::result::Result<T, SddError>;
