//! Polymarket snapshot and side types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Outcome side of the hourly up-or-down market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolySide {
    /// Pays $1.00 if the underlying finishes above the reference open.
    Up,
    /// Pays $1.00 if the underlying finishes at or below the reference open.
    Down,
}

impl PolySide {
    /// Returns the opposite side.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }

    /// Display form matching the venue's outcome labels.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "Up",
            Self::Down => "Down",
        }
    }
}

impl std::fmt::Display for PolySide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Order direction on the CLOB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Uppercase wire form used by the CLOB API.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalized data for one hourly up-or-down market.
///
/// Invariant observed in any non-crossed book: when both asks are present,
/// `ask_up + ask_down > 1`; a sum below $1.00 is the arbitrage signal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolymarketSnapshot {
    /// Reference open price for the hour (the implicit strike `K*`).
    pub price_to_beat: Option<Decimal>,
    /// Current BTC price for context.
    pub current_price: Option<Decimal>,
    /// Best ask for the Up contract, dollars in `[0, 1]`.
    pub ask_up: Option<Decimal>,
    /// Best ask for the Down contract, dollars in `[0, 1]`.
    pub ask_down: Option<Decimal>,
    /// Polymarket event slug.
    pub slug: String,
    /// Market expiry time in UTC.
    pub target_time_utc: Option<DateTime<Utc>>,
    /// CLOB token id per side, when resolved.
    pub token_up: Option<String>,
    /// CLOB token id per side, when resolved.
    pub token_down: Option<String>,
}

impl PolymarketSnapshot {
    /// Ask for the given side, treating a missing quote as zero.
    ///
    /// Zero asks are present-but-unusable: the detector still evaluates them
    /// and depth checks downstream reject the fill.
    #[must_use]
    pub fn ask(&self, side: PolySide) -> Decimal {
        match side {
            PolySide::Up => self.ask_up.unwrap_or(Decimal::ZERO),
            PolySide::Down => self.ask_down.unwrap_or(Decimal::ZERO),
        }
    }

    /// Token id for the given side, when resolved.
    #[must_use]
    pub fn token(&self, side: PolySide) -> Option<&str> {
        match side {
            PolySide::Up => self.token_up.as_deref(),
            PolySide::Down => self.token_down.as_deref(),
        }
    }
}

/// Best bid/ask pair maintained by the book feed for one token.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BookTop {
    pub best_bid: Option<f64>,
    pub best_ask: Option<f64>,
    pub last_update: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_poly_side_opposite() {
        assert_eq!(PolySide::Up.opposite(), PolySide::Down);
        assert_eq!(PolySide::Down.opposite(), PolySide::Up);
    }

    #[test]
    fn test_side_wire_form() {
        assert_eq!(Side::Buy.as_str(), "BUY");
        assert_eq!(format!("{}", Side::Sell), "SELL");
        assert_eq!(serde_json::to_string(&Side::Buy).unwrap(), "\"BUY\"");
    }

    #[test]
    fn test_snapshot_ask_accessor() {
        let snapshot = PolymarketSnapshot {
            ask_up: Some(dec!(0.55)),
            ask_down: None,
            ..Default::default()
        };

        assert_eq!(snapshot.ask(PolySide::Up), dec!(0.55));
        assert_eq!(snapshot.ask(PolySide::Down), Decimal::ZERO);
    }

    #[test]
    fn test_snapshot_token_accessor() {
        let snapshot = PolymarketSnapshot {
            token_up: Some("up-token".to_string()),
            ..Default::default()
        };

        assert_eq!(snapshot.token(PolySide::Up), Some("up-token"));
        assert_eq!(snapshot.token(PolySide::Down), None);
    }

    #[test]
    fn test_snapshot_serialization_round_trip() {
        let snapshot = PolymarketSnapshot {
            price_to_beat: Some(dec!(96000)),
            ask_up: Some(dec!(0.40)),
            ask_down: Some(dec!(0.35)),
            slug: "bitcoin-up-or-down-3pm-et".to_string(),
            ..Default::default()
        };

        let json = serde_json::to_string(&snapshot).unwrap();
        let back: PolymarketSnapshot = serde_json::from_str(&json).unwrap();

        assert_eq!(back.price_to_beat, Some(dec!(96000)));
        assert_eq!(back.slug, "bitcoin-up-or-down-3pm-et");
    }
}
