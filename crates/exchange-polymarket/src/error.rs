//! Error types for the Polymarket integration.

use thiserror::Error;

/// Errors that can occur when interacting with Polymarket.
#[derive(Debug, Error)]
pub enum PolymarketError {
    /// Network error.
    #[error("network error: {0}")]
    Network(String),

    /// Request timeout.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// API returned a non-success status.
    #[error("API error: {status_code} - {message}")]
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Error message from the API.
        message: String,
    },

    /// Response could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Event or market missing from the Gamma response.
    #[error("market not found: {0}")]
    MarketNotFound(String),

    /// Missing credentials for a signed operation.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Order rejected by the exchange.
    #[error("order rejected: {0}")]
    OrderRejected(String),
}

impl PolymarketError {
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

impl From<reqwest::Error> for PolymarketError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for PolymarketError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Result type alias for Polymarket operations.
pub type Result<T> = std::result::Result<T, PolymarketError>;
