//! Kalshi market universe types.
//!
//! Each hourly event lists a ladder of binary contracts at distinct strikes.
//! Quotes are integer cents (0–99); conversion to dollars happens at the
//! detector boundary.

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::OnceLock;

/// Contract side on Kalshi.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KalshiSide {
    /// Pays $1.00 if the underlying finishes above the strike.
    Yes,
    /// Pays $1.00 if the underlying finishes at or below the strike.
    No,
}

impl KalshiSide {
    /// Returns the opposite side.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Yes => Self::No,
            Self::No => Self::Yes,
        }
    }

    /// Lowercase wire form used by the order API.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
        }
    }
}

impl std::fmt::Display for KalshiSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single binary contract at a specific strike.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KalshiMarket {
    /// Strike price in USD.
    pub strike: Decimal,
    /// Best bid for Yes in cents.
    pub yes_bid: u32,
    /// Best ask for Yes in cents.
    pub yes_ask: u32,
    /// Best bid for No in cents.
    pub no_bid: u32,
    /// Best ask for No in cents.
    pub no_ask: u32,
    /// Human-readable market description, e.g. "$96,250 or above".
    pub subtitle: String,
}

impl KalshiMarket {
    /// Yes ask converted to dollars.
    #[must_use]
    pub fn yes_ask_dollars(&self) -> Decimal {
        Decimal::from(self.yes_ask) / Decimal::from(100)
    }

    /// No ask converted to dollars.
    #[must_use]
    pub fn no_ask_dollars(&self) -> Decimal {
        Decimal::from(self.no_ask) / Decimal::from(100)
    }

    /// Ask for the given side, in dollars.
    #[must_use]
    pub fn ask_dollars(&self, side: KalshiSide) -> Decimal {
        match side {
            KalshiSide::Yes => self.yes_ask_dollars(),
            KalshiSide::No => self.no_ask_dollars(),
        }
    }
}

/// The full strike ladder for one hourly event.
///
/// Invariant: `markets` is sorted by strike ascending and every strike is
/// positive (unparseable strikes are dropped at the client boundary).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KalshiSnapshot {
    /// Kalshi event ticker.
    pub event_ticker: String,
    /// Current BTC price for context, if available.
    pub current_price: Option<Decimal>,
    /// Markets sorted by strike ascending.
    pub markets: Vec<KalshiMarket>,
}

impl KalshiSnapshot {
    /// Returns true if the snapshot holds no markets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }

    /// Lowest and highest strike, if any markets exist.
    #[must_use]
    pub fn strike_range(&self) -> Option<(Decimal, Decimal)> {
        match (self.markets.first(), self.markets.last()) {
            (Some(first), Some(last)) => Some((first.strike, last.strike)),
            _ => None,
        }
    }
}

fn strike_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$([\d,]+)").expect("valid strike regex"))
}

/// Parses the strike price from a Kalshi subtitle.
///
/// Format: `"$96,250 or above"` → `96250`. Returns `None` when no dollar
/// amount is present.
#[must_use]
pub fn parse_strike(subtitle: &str) -> Option<Decimal> {
    let captures = strike_pattern().captures(subtitle)?;
    let digits = captures.get(1)?.as_str().replace(',', "");
    Decimal::from_str(&digits).ok()
}
