//! Error types for the Kalshi integration.

use thiserror::Error;

/// Errors that can occur when interacting with Kalshi.
#[derive(Debug, Error)]
pub enum KalshiError {
    /// Authentication or signing failed.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// RSA signing error.
    #[error("RSA signing error: {0}")]
    Signing(String),

    /// API request failed.
    #[error("API error: {status_code} - {message}")]
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Error message from API.
        message: String,
    },

    /// Network error.
    #[error("network error: {0}")]
    Network(String),

    /// Request timeout.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// Invalid order parameters.
    #[error("invalid order: {0}")]
    InvalidOrder(String),

    /// Order rejected by the exchange.
    #[error("order rejected: {0}")]
    OrderRejected(String),

    /// Missing credentials for a signed operation.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl KalshiError {
    /// Creates an API error from status code and message.
    pub fn api(status_code: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status_code,
            message: message.into(),
        }
    }

    /// Returns true if the operation may succeed on retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Api { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for KalshiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Network(format!("connection failed: {err}"))
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for KalshiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias for Kalshi operations.
pub type Result<T> = std::result::Result<T, KalshiError>;
