//! Error types shared across WDP crates

use thiserror::Error;

/// Result type alias for WDP operations
pub type Result<T> = std::result::Result<T, WdpError>;

/// Workspace-wide error type
#[derive(Error, Debug)]
pub enum WdpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl WdpError {
    /// Shorthand for a configuration error with a plain message
    pub fn config(msg: impl Into<String>) -> Self {
        WdpError::Config(msg.into())
    }
}
