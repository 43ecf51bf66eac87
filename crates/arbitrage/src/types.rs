//! Arbitrage check records.

use btc_arb_kalshi::types::KalshiSide;
use btc_arb_polymarket::types::PolySide;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How Polymarket's implicit strike `K*` relates to a Kalshi strike `K`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrikeRelation {
    /// `K* > K`: buy Down on Polymarket, Yes on Kalshi.
    PolyAbove,
    /// `K* < K`: buy Up on Polymarket, No on Kalshi.
    PolyBelow,
    /// `K* = K`: both strategy pairs apply.
    Equal,
}

impl StrikeRelation {
    /// Returns the display string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PolyAbove => "Poly > Kalshi",
            Self::PolyBelow => "Poly < Kalshi",
            Self::Equal => "Equal",
        }
    }
}

impl std::fmt::Display for StrikeRelation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One evaluated strategy pair.
///
/// Identities maintained by construction: `total_cost = poly_cost +
/// kalshi_cost`, `margin = 1 − total_cost`, `net_margin ≤ margin`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrageCheck {
    /// Kalshi strike in USD.
    pub kalshi_strike: Decimal,
    /// Kalshi Yes ask in dollars.
    pub kalshi_yes: Decimal,
    /// Kalshi No ask in dollars.
    pub kalshi_no: Decimal,
    /// Strike relation that picked the strategy.
    pub relation: StrikeRelation,
    /// Which Polymarket contract to buy.
    pub poly_leg: PolySide,
    /// Which Kalshi contract to buy.
    pub kalshi_leg: KalshiSide,
    /// Cost of the Polymarket leg in dollars.
    pub poly_cost: Decimal,
    /// Cost of the Kalshi leg in dollars.
    pub kalshi_cost: Decimal,
    /// Raw total cost before fees.
    pub total_cost: Decimal,
    /// Total cost including worst-case fees and slippage.
    pub fee_adjusted_cost: Decimal,
    /// Raw margin before fees.
    pub margin: Decimal,
    /// Net margin after fees and slippage.
    pub net_margin: Decimal,
    /// True when the net margin meets the configured minimum.
    pub is_arbitrage: bool,
}

impl ArbitrageCheck {
    /// Short human-readable description for logs and events.
    #[must_use]
    pub fn describe(&self) -> String {
        format!(
            "{} @ {} | poly {} ${} + kalshi {} ${} = ${} (net ${})",
            self.relation,
            self.kalshi_strike,
            self.poly_leg,
            self.poly_cost,
            self.kalshi_leg,
            self.kalshi_cost,
            self.total_cost,
            self.net_margin,
        )
    }
}
