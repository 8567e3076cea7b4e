//! # Recall Error Types
//!
//! Centralized error handling for the Recall core library.
//!
//! Construction-time misconfiguration is fatal and surfaces as
//! [`RecallError::Configuration`]. Per-request failures (backend outages,
//! malformed input) are absorbed by the orchestrator and turned into
//! degraded results, so they rarely reach callers.

use thiserror::Error;

/// Result type alias for Recall operations
pub type Result<T> = std::result::Result<T, RecallError>;

/// Core error types for Recall
#[derive(Error, Debug)]
pub enum RecallError {
    /// Missing or invalid credentials/endpoints at startup
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transient network/service failure
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Invalid message shapes or identifiers
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Language-model errors
    #[error("AI error: {0}")]
    Ai(String),

    /// Memory backend errors
    #[error("Memory error: {0}")]
    Memory(String),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file parse errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl RecallError {
    /// Create a new configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new backend unavailable error
    pub fn backend_unavailable(msg: impl Into<String>) -> Self {
        Self::BackendUnavailable(msg.into())
    }

    /// Create a new malformed input error
    pub fn malformed_input(msg: impl Into<String>) -> Self {
        Self::MalformedInput(msg.into())
    }

    /// Create a new AI error
    pub fn ai(msg: impl Into<String>) -> Self {
        Self::Ai(msg.into())
    }

    /// Create a new memory error
    pub fn memory(msg: impl Into<String>) -> Self {
        Self::Memory(msg.into())
    }

    /// Create a new generic/other error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Whether this error is a per-request failure the orchestrator degrades on
    /// rather than a fatal misconfiguration.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Configuration(_) | Self::Toml(_))
    }
}
