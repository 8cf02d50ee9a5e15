//! Error types for taskferry-core

use std::time::Duration;

use thiserror::Error;

/// Result type alias using taskferry-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in taskferry-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed local/remote payload or malformed merge result.
    /// Raised before any replica is written.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Downloaded attachment content did not match its recorded hash
    #[error("Integrity error for attachment {attachment_id}: expected {expected}, got {actual}")]
    Integrity {
        attachment_id: String,
        expected: String,
        actual: String,
    },

    /// Timeouts, connection failures and 5xx responses
    #[error("Network error: {0}")]
    Network(String),

    /// Backend asked us to slow down
    #[error("Rate limited by {backend} backend")]
    RateLimited {
        backend: &'static str,
        retry_after: Option<Duration>,
    },

    /// Remote object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Permanent backend failure (4xx other than 404/429, bad responses)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration could not be loaded or is incomplete
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local storage read did not finish in time
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether retrying the same request may succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }

    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() || error.is_connect() || error.is_request() {
            return Self::Network(error.to_string());
        }
        if error.status().is_some_and(|status| status.is_server_error()) {
            return Self::Network(error.to_string());
        }
        Self::Storage(error.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Self::Config(error.to_string())
    }
}
