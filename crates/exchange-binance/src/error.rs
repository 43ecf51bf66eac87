//! Error types for the Binance integration.

use thiserror::Error;

/// Errors from the Binance REST client and WebSocket feed.
#[derive(Debug, Error)]
pub enum BinanceError {
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

    /// The requested hourly candle does not exist yet.
    #[error("candle not found yet for {0}")]
    CandleNotFound(String),
}

impl BinanceError {
    /// Returns true if retrying the request may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Api { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for BinanceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Result type alias for Binance operations.
pub type Result<T> = std::result::Result<T, BinanceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_is_transient() {
        assert!(BinanceError::Network("refused".to_string()).is_transient());
        assert!(BinanceError::Timeout("slow".to_string()).is_transient());
    }

    #[test]
    fn test_server_error_is_transient_client_error_is_not() {
        let server = BinanceError::Api {
            status_code: 503,
            message: "unavailable".to_string(),
        };
        let client = BinanceError::Api {
            status_code: 400,
            message: "bad symbol".to_string(),
        };

        assert!(server.is_transient());
        assert!(!client.is_transient());
    }

    #[test]
    fn test_candle_not_found_display() {
        let err = BinanceError::CandleNotFound("2026-02-01T15:00:00Z".to_string());
        assert!(err.to_string().contains("not found"));
        assert!(!err.is_transient());
    }
}
