//! Unified stream events.
//!
//! Every feed and every core component reports into the stream hub using the
//! same envelope, so subscribers (the SSE endpoint, the circuit breaker's
//! freshness tracking) can consume one ordered stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Origin of a stream event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    /// Reference-price feed.
    Binance,
    /// Polymarket order-book feed.
    Polymarket,
    /// Kalshi market-list poll.
    Kalshi,
    /// Order engine and detector.
    Engine,
    /// Risk manager, circuit breaker, kill switch.
    Safety,
}

impl EventSource {
    /// Returns the display string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Binance => "binance",
            Self::Polymarket => "polymarket",
            Self::Kalshi => "kalshi",
            Self::Engine => "engine",
            Self::Safety => "safety",
        }
    }
}

impl std::fmt::Display for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The unit flowing through the stream hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEvent {
    pub source: EventSource,
    /// Event discriminator, e.g. `price`, `book_update`, `market_data`.
    pub event_type: String,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

impl StreamEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(source: EventSource, event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            source,
            event_type: event_type.into(),
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Reference price update.
    #[must_use]
    pub fn price(price: f64, symbol: &str) -> Self {
        Self::new(
            EventSource::Binance,
            "price",
            serde_json::json!({ "price": price, "symbol": symbol }),
        )
    }

    /// Best bid/ask change for one Polymarket token.
    #[must_use]
    pub fn book_update(token_id: &str, best_bid: Option<f64>, best_ask: Option<f64>) -> Self {
        Self::new(
            EventSource::Polymarket,
            "book_update",
            serde_json::json!({
                "token_id": token_id,
                "best_bid": best_bid,
                "best_ask": best_ask,
            }),
        )
    }

    /// Fresh Kalshi market list.
    #[must_use]
    pub fn market_data(payload: Value) -> Self {
        Self::new(EventSource::Kalshi, "market_data", payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_as_str() {
        assert_eq!(EventSource::Binance.as_str(), "binance");
        assert_eq!(EventSource::Safety.as_str(), "safety");
        assert_eq!(format!("{}", EventSource::Kalshi), "kalshi");
    }

    #[test]
    fn test_price_event_payload() {
        let event = StreamEvent::price(96000.5, "BTCUSDT");

        assert_eq!(event.source, EventSource::Binance);
        assert_eq!(event.event_type, "price");
        assert_eq!(event.payload["symbol"], "BTCUSDT");
        assert!((event.payload["price"].as_f64().unwrap() - 96000.5).abs() < 1e-9);
    }

    #[test]
    fn test_book_update_event() {
        let event = StreamEvent::book_update("token-1", Some(0.48), None);

        assert_eq!(event.source, EventSource::Polymarket);
        assert_eq!(event.event_type, "book_update");
        assert_eq!(event.payload["token_id"], "token-1");
        assert!(event.payload["best_ask"].is_null());
    }

    #[test]
    fn test_event_serialization_round_trip() {
        let event = StreamEvent::market_data(serde_json::json!({ "markets": [] }));
        let json = serde_json::to_string(&event).unwrap();
        let back: StreamEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(back.source, EventSource::Kalshi);
        assert_eq!(back.event_type, "market_data");
    }
}
