//! In-memory position ledger.
//!
//! Two ledgers: individual positions keyed by `POS-<6-digit>` ids, and
//! arbitrage pairs keyed by `ARB-<6-digit>`. Positions are created on fill
//! and closed on settle or unwind, never mutated otherwise (the pairing step
//! fills in the cross-reference once both legs exist).

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

/// Which venue a position sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    Kalshi,
    Polymarket,
}

impl Venue {
    /// Returns the display string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Kalshi => "kalshi",
            Self::Polymarket => "polymarket",
        }
    }
}

impl std::fmt::Display for Venue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Direction of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    /// Bought the affirmative contract (Yes / Up).
    Long,
    /// Bought the opposite contract (No / Down).
    Short,
}

impl PositionSide {
    /// Returns the display string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Short => "short",
        }
    }
}

/// A single open position on one venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub venue: Venue,
    pub side: PositionSide,
    pub ticker: String,
    /// Price paid per contract.
    pub entry_price: Decimal,
    /// Number of contracts.
    pub size: u32,
    /// `entry_price * size`.
    pub cost_usd: Decimal,
    pub opened_at: DateTime<Utc>,
    /// Id of the paired position on the other venue.
    pub linked_id: Option<String>,
}

/// Lifecycle of an arbitrage pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArbStatus {
    Open,
    Settled,
    Failed,
    Unwound,
}

/// A paired position across both venues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitragePair {
    pub id: String,
    pub kalshi_position: Position,
    pub poly_position: Position,
    /// Combined cost of both legs.
    pub total_cost: Decimal,
    /// $1.00 per contract.
    pub expected_payout: Decimal,
    pub expected_profit: Decimal,
    pub status: ArbStatus,
    pub opened_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

/// Summary statistics for monitoring.
#[derive(Debug, Clone, Serialize)]
pub struct TrackerSummary {
    pub open_positions: usize,
    pub total_exposure_usd: Decimal,
    pub kalshi_exposure_usd: Decimal,
    pub polymarket_exposure_usd: Decimal,
    pub open_arbitrages: usize,
    pub settled_arbitrages: usize,
    pub total_expected_profit: Decimal,
}

#[derive(Debug, Default)]
struct TrackerState {
    positions: HashMap<String, Position>,
    arbs: HashMap<String, ArbitragePair>,
    position_counter: u64,
    arb_counter: u64,
}

/// Tracks open positions across both venues.
#[derive(Debug, Default)]
pub struct PositionTracker {
    state: RwLock<TrackerState>,
}

impl PositionTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new open position and returns it.
    pub fn open_position(
        &self,
        venue: Venue,
        side: PositionSide,
        ticker: impl Into<String>,
        entry_price: Decimal,
        size: u32,
        linked_id: Option<String>,
    ) -> Position {
        let mut state = self.state.write();
        state.position_counter += 1;
        let id = format!("POS-{:06}", state.position_counter);

        let position = Position {
            id: id.clone(),
            venue,
            side,
            ticker: ticker.into(),
            entry_price,
            size,
            cost_usd: entry_price * Decimal::from(size),
            opened_at: Utc::now(),
            linked_id,
        };
        state.positions.insert(id, position.clone());

        info!(
            id = %position.id,
            venue = %position.venue,
            side = position.side.as_str(),
            ticker = %position.ticker,
            cost = %position.cost_usd,
            "Position opened"
        );
        position
    }

    /// Removes a position from the open ledger.
    pub fn close_position(&self, position_id: &str, reason: &str) -> Option<Position> {
        let removed = self.state.write().positions.remove(position_id);
        match &removed {
            Some(_) => info!(id = position_id, reason, "Position closed"),
            None => warn!(id = position_id, "Position not found for closing"),
        }
        removed
    }

    /// Fetches an open position by id.
    #[must_use]
    pub fn position(&self, position_id: &str) -> Option<Position> {
        self.state.read().positions.get(position_id).cloned()
    }

    /// Records a paired arbitrage position across both venues.
    ///
    /// Both legs must be open; their `linked_id`s are set to reference each
    /// other.
    pub fn open_arbitrage(
        &self,
        kalshi_id: &str,
        poly_id: &str,
        expected_profit: Decimal,
    ) -> Option<ArbitragePair> {
        let mut state = self.state.write();

        if !state.positions.contains_key(kalshi_id) || !state.positions.contains_key(poly_id) {
            warn!(kalshi_id, poly_id, "Cannot pair: leg missing from ledger");
            return None;
        }

        if let Some(kalshi) = state.positions.get_mut(kalshi_id) {
            kalshi.linked_id = Some(poly_id.to_string());
        }
        if let Some(poly) = state.positions.get_mut(poly_id) {
            poly.linked_id = Some(kalshi_id.to_string());
        }

        let kalshi_position = state.positions[kalshi_id].clone();
        let poly_position = state.positions[poly_id].clone();
        let total_cost = kalshi_position.cost_usd + poly_position.cost_usd;

        state.arb_counter += 1;
        let id = format!("ARB-{:06}", state.arb_counter);

        let pair = ArbitragePair {
            id: id.clone(),
            kalshi_position,
            poly_position,
            total_cost,
            expected_payout: Decimal::ONE,
            expected_profit,
            status: ArbStatus::Open,
            opened_at: Utc::now(),
            settled_at: None,
        };
        state.arbs.insert(id, pair.clone());

        info!(
            id = %pair.id,
            cost = %total_cost,
            profit = %expected_profit,
            "Arbitrage pair opened"
        );
        Some(pair)
    }

    /// Marks an arbitrage pair settled and closes both legs.
    pub fn settle_arbitrage(
        &self,
        arb_id: &str,
        actual_pnl: Option<Decimal>,
    ) -> Option<ArbitragePair> {
        let pair = {
            let mut state = self.state.write();
            let pair = state.arbs.get_mut(arb_id)?;
            pair.status = ArbStatus::Settled;
            pair.settled_at = Some(Utc::now());
            pair.clone()
        };

        self.close_position(&pair.kalshi_position.id, "arb settled");
        self.close_position(&pair.poly_position.id, "arb settled");

        info!(
            id = arb_id,
            pnl = %actual_pnl.unwrap_or(pair.expected_profit),
            "Arbitrage settled"
        );
        Some(pair)
    }

    /// Total USD at risk across all open positions.
    #[must_use]
    pub fn total_exposure(&self) -> Decimal {
        self.state
            .read()
            .positions
            .values()
            .map(|p| p.cost_usd)
            .sum()
    }

    /// USD at risk on one venue.
    #[must_use]
    pub fn venue_exposure(&self, venue: Venue) -> Decimal {
        self.state
            .read()
            .positions
            .values()
            .filter(|p| p.venue == venue)
            .map(|p| p.cost_usd)
            .sum()
    }

    /// Number of open individual positions.
    #[must_use]
    pub fn open_position_count(&self) -> usize {
        self.state.read().positions.len()
    }

    /// Number of open arbitrage pairs.
    #[must_use]
    pub fn open_arbitrage_count(&self) -> usize {
        self.state
            .read()
            .arbs
            .values()
            .filter(|a| a.status == ArbStatus::Open)
            .count()
    }

    /// All open positions.
    #[must_use]
    pub fn all_positions(&self) -> Vec<Position> {
        self.state.read().positions.values().cloned().collect()
    }

    /// All arbitrage pairs, open and settled.
    #[must_use]
    pub fn all_arbitrages(&self) -> Vec<ArbitragePair> {
        self.state.read().arbs.values().cloned().collect()
    }

    /// Summary statistics for monitoring.
    #[must_use]
    pub fn summary(&self) -> TrackerSummary {
        let state = self.state.read();
        let open: Vec<_> = state
            .arbs
            .values()
            .filter(|a| a.status == ArbStatus::Open)
            .collect();

        TrackerSummary {
            open_positions: state.positions.len(),
            total_exposure_usd: state.positions.values().map(|p| p.cost_usd).sum(),
            kalshi_exposure_usd: state
                .positions
                .values()
                .filter(|p| p.venue == Venue::Kalshi)
                .map(|p| p.cost_usd)
                .sum(),
            polymarket_exposure_usd: state
                .positions
                .values()
                .filter(|p| p.venue == Venue::Polymarket)
                .map(|p| p.cost_usd)
                .sum(),
            open_arbitrages: open.len(),
            settled_arbitrages: state
                .arbs
                .values()
                .filter(|a| a.status == ArbStatus::Settled)
                .count(),
            total_expected_profit: open.iter().map(|a| a.expected_profit).sum(),
        }
    }
}
