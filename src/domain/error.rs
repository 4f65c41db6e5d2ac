//! Domain error types for syncview.
//!
//! Diff errors are cloneable because they travel through queue handles that may
//! be observed more than once; stream errors stay local to the transport loop.

use thiserror::Error;

/// Errors raised while producing, parsing or normalizing a resource diff.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiffError {
    #[error("Invalid diff format: {0}")]
    InvalidFormat(String),

    #[error("Diff computation failed for {name}: {message}")]
    Computation { name: String, message: String },

    #[error("Diff computation panicked for {name}")]
    Panicked { name: String },

    #[error("Manifest normalization failed: {0}")]
    Normalize(String),
}

/// Errors raised by the watch-stream transport.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Failed to open event stream {path}: {message}")]
    Connect { path: String, message: String },

    #[error("Event stream transport error: {0}")]
    Transport(String),

    #[error("Event stream closed")]
    Closed,

    #[error("Stream operation failed: {0}")]
    OperationFailed(#[from] anyhow::Error),
}

/// Errors raised while loading or saving the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Unified domain error type for callers that handle both subsystems.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Diff error: {0}")]
    Diff(#[from] DiffError),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unknown domain error: {0}")]
    Unknown(String),
}

impl From<String> for DomainError {
    fn from(s: String) -> Self {
        DomainError::Unknown(s)
    }
}

impl From<&str> for DomainError {
    fn from(s: &str) -> Self {
        DomainError::Unknown(s.to_string())
    }
}
