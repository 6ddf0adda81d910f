//! Error types for the appointments API client
//!
//! Only the call path itself can fail: configuration, transport and
//! interceptor errors surface to the caller. Masking and log formatting
//! never produce errors.

use thiserror::Error;

/// Main error type for outbound API calls
#[derive(Error, Debug)]
pub enum ApiError {
    /// Backend base URL is not configured
    #[error("Missing configuration: API base URL not provided")]
    MissingConfig,

    /// The composed request URL could not be used
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Transport-level failure (connection, DNS, timeout, body read)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A registered interceptor rejected the call
    #[error("Interceptor error: {0}")]
    Interceptor(String),

    /// Generic error for unexpected failures
    #[error("Unexpected error: {0}")]
    Other(String),
}

impl ApiError {
    /// Create a generic error from any message
    pub fn from_string(msg: impl Into<String>) -> Self {
        ApiError::Other(msg.into())
    }

    /// Create an interceptor error
    pub fn interceptor(msg: impl Into<String>) -> Self {
        ApiError::Interceptor(msg.into())
    }
}
