//! Error types for the MAITRI gateway

use thiserror::Error;

/// Result type alias for MAITRI operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the gateway or the assistant loop
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Completion service returned an unusable answer
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Gateway (backend) returned a non-success response
    #[error("gateway error: {0}")]
    Gateway(String),

    /// Speech synthesis error
    #[error("speech error: {0}")]
    Speech(String),

    /// Speech recognition error
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Face detection / reference loading error
    #[error("vision error: {0}")]
    Vision(String),

    /// Report sink error
    #[error("report error: {0}")]
    Report(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
