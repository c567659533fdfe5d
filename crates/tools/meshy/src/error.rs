//! Error types for the Meshy client

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while submitting, polling or listing tasks
#[derive(Debug, Error)]
pub enum MeshyError {
    /// The request is incomplete; raised before any network call
    #[error("Invalid request: {0}")]
    Validation(String),

    /// No usable API key; raised before any network call
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Server answered 429 during polling; single requests report it as `Remote`
    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// Server answered with any other non-2xx status
    #[error("Server error ({status}): {body}")]
    Remote { status: u16, body: String },

    /// Server answered 2xx but the payload is not what the API promises
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Polling was cancelled by the caller; the task keeps running server-side
    #[error("Polling cancelled")]
    Cancelled,

    /// Operation is not available for this job family
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Request timeout after {0:?}")]
    TimeoutError(Duration),

    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Background poll ended without delivering a result
    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Meshy operations
pub type Result<T> = std::result::Result<T, MeshyError>;

impl MeshyError {
    /// Returns true if the poller retries this error on its own
    pub fn is_retryable(&self) -> bool {
        matches!(self, MeshyError::RateLimited { .. })
    }

    /// HTTP status carried by the error, if it came from a server response
    pub fn status(&self) -> Option<u16> {
        match self {
            MeshyError::RateLimited { .. } => Some(429),
            MeshyError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}
