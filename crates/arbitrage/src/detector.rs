//! Strike-neighborhood arbitrage detector.
//!
//! A single hourly reference strike typically sits between two Kalshi rungs;
//! only nearby strikes can cross, so the scan is clipped to a window around
//! the closest one.
//!
//! Strategy per Kalshi strike `K` against the reference strike `K*`:
//! - `K* > K`: Down + Yes. Down wins iff the underlying ends at or below
//!   `K*`, Yes wins iff it ends above `K`; both win inside `(K, K*]`, so this
//!   is a hedge with a loss range only where exactly one leg wins.
//! - `K* < K`: Up + No, symmetric.
//! - `K* = K`: both checks.

use crate::fees::FeeEngine;
use crate::types::{ArbitrageCheck, StrikeRelation};
use btc_arb_kalshi::types::{KalshiMarket, KalshiSide, KalshiSnapshot};
use btc_arb_polymarket::types::{PolySide, PolymarketSnapshot};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, warn};

/// Number of strikes scanned on each side of the closest one.
pub const NEIGHBORHOOD_RADIUS: usize = 4;

/// Detector over the two venue snapshots.
#[derive(Debug, Clone, Default)]
pub struct ArbitrageDetector {
    fees: FeeEngine,
}

impl ArbitrageDetector {
    /// Creates a detector with the given fee engine.
    #[must_use]
    pub fn new(fees: FeeEngine) -> Self {
        Self { fees }
    }

    /// Returns the fee engine.
    #[must_use]
    pub fn fees(&self) -> &FeeEngine {
        &self.fees
    }

    /// Scans all strategy pairs and returns `(all_checks, opportunities)`.
    ///
    /// `all_checks` holds every pair evaluated (for observability);
    /// `opportunities` only the fee-adjusted profitable ones. A missing
    /// reference strike or an empty ladder yields two empty lists.
    #[must_use]
    pub fn find_opportunities(
        &self,
        poly: &PolymarketSnapshot,
        kalshi: &KalshiSnapshot,
    ) -> (Vec<ArbitrageCheck>, Vec<ArbitrageCheck>) {
        let Some(poly_strike) = poly.price_to_beat else {
            warn!("Polymarket reference strike missing, skipping scan");
            return (Vec::new(), Vec::new());
        };

        let poly_up = poly.ask(PolySide::Up);
        let poly_down = poly.ask(PolySide::Down);

        let selected = select_neighborhood(&kalshi.markets, poly_strike, NEIGHBORHOOD_RADIUS);

        let mut all_checks = Vec::new();
        let mut opportunities = Vec::new();

        for market in selected {
            for check in self.checks_for_strike(market, poly_strike, poly_up, poly_down) {
                if check.is_arbitrage {
                    info!(
                        relation = %check.relation,
                        net_margin = %check.net_margin,
                        fee_adjusted_cost = %check.fee_adjusted_cost,
                        "Arbitrage found: {}",
                        check.describe()
                    );
                    opportunities.push(check.clone());
                }
                all_checks.push(check);
            }
        }

        (all_checks, opportunities)
    }

    /// One or two checks for a single strike, per the strategy table.
    fn checks_for_strike(
        &self,
        market: &KalshiMarket,
        poly_strike: Decimal,
        poly_up: Decimal,
        poly_down: Decimal,
    ) -> Vec<ArbitrageCheck> {
        let yes = market.yes_ask_dollars();
        let no = market.no_ask_dollars();

        match poly_strike.cmp(&market.strike) {
            std::cmp::Ordering::Greater => vec![self.build_check(
                market,
                StrikeRelation::PolyAbove,
                PolySide::Down,
                KalshiSide::Yes,
                poly_down,
                yes,
            )],
            std::cmp::Ordering::Less => vec![self.build_check(
                market,
                StrikeRelation::PolyBelow,
                PolySide::Up,
                KalshiSide::No,
                poly_up,
                no,
            )],
            std::cmp::Ordering::Equal => vec![
                self.build_check(
                    market,
                    StrikeRelation::Equal,
                    PolySide::Down,
                    KalshiSide::Yes,
                    poly_down,
                    yes,
                ),
                self.build_check(
                    market,
                    StrikeRelation::Equal,
                    PolySide::Up,
                    KalshiSide::No,
                    poly_up,
                    no,
                ),
            ],
        }
    }

    fn build_check(
        &self,
        market: &KalshiMarket,
        relation: StrikeRelation,
        poly_leg: PolySide,
        kalshi_leg: KalshiSide,
        poly_cost: Decimal,
        kalshi_cost: Decimal,
    ) -> ArbitrageCheck {
        let total_cost = poly_cost + kalshi_cost;

        ArbitrageCheck {
            kalshi_strike: market.strike,
            kalshi_yes: market.yes_ask_dollars(),
            kalshi_no: market.no_ask_dollars(),
            relation,
            poly_leg,
            kalshi_leg,
            poly_cost,
            kalshi_cost,
            total_cost,
            fee_adjusted_cost: self.fees.fee_adjusted_cost(total_cost),
            margin: dec!(1.00) - total_cost,
            net_margin: self.fees.net_margin(total_cost),
            is_arbitrage: self.fees.is_profitable(total_cost),
        }
    }
}

/// Selects the markets within `±radius` of the strike closest to
/// `poly_strike`. Ties between equidistant strikes break to the lower index.
/// Assumes `markets` is sorted by strike ascending.
fn select_neighborhood(
    markets: &[KalshiMarket],
    poly_strike: Decimal,
    radius: usize,
) -> &[KalshiMarket] {
    if markets.is_empty() {
        return markets;
    }

    let mut closest_idx = 0;
    let mut min_diff: Option<Decimal> = None;
    for (i, market) in markets.iter().enumerate() {
        let diff = (market.strike - poly_strike).abs();
        if min_diff.map_or(true, |best| diff < best) {
            min_diff = Some(diff);
            closest_idx = i;
        }
    }

    let start = closest_idx.saturating_sub(radius);
    let end = (closest_idx + radius + 1).min(markets.len());
    &markets[start..end]
}
