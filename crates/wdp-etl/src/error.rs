//! Error types for the ETL pipeline
//!
//! Stage-level errors only. Record-level failures (a single raw file that is
//! malformed or incomplete) are represented by
//! [`NormalizeError`](crate::normalize::NormalizeError) and absorbed inside
//! the transform stage; they never surface here.

use thiserror::Error;

/// Result type alias for ETL operations
pub type Result<T> = std::result::Result<T, EtlError>;

/// Stage-level error type
///
/// Every variant aborts the current stage and propagates to the scheduler,
/// which marks the task failed and withholds downstream stages.
#[derive(Error, Debug)]
pub enum EtlError {
    /// Configuration is missing or invalid
    #[error("Configuration error: {0}. Check your environment variables or .env file.")]
    Config(String),

    /// Raw zone absent: the extract stage has not produced anything yet
    #[error("Raw staging zone not found at '{0}'. Run the extract stage first.")]
    RawZoneMissing(String),

    /// No processed artifact matches the naming convention
    #[error("No processed artifact found in '{0}'. Run (or rerun) the transform stage first.")]
    NoArtifact(String),

    /// Database operation failed (connect or append)
    #[error("Database error: {0}. Check your database connection settings.")]
    Database(#[from] sqlx::Error),

    /// Weather provider request failed
    #[error("Network request failed: {0}. Check your connection and provider URL.")]
    Http(#[from] reqwest::Error),

    /// File system operation failed
    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    /// Artifact could not be encoded or decoded
    #[error("Artifact format error: {0}")]
    Artifact(#[from] csv::Error),
}

impl EtlError {
    /// Shorthand for a configuration error with a plain message
    pub fn config(msg: impl Into<String>) -> Self {
        EtlError::Config(msg.into())
    }
}
