//! Order-book depth model.
//!
//! Holds the full book for one token and answers the executor's question:
//! how many contracts can be bought under a price limit with a fixed budget.

use crate::types::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single price level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookLevel {
    pub price: Decimal,
    pub size: Decimal,
}

impl OrderBookLevel {
    /// Creates a level.
    #[must_use]
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }
}

/// Full order book for a Polymarket token.
///
/// Bids are kept sorted descending, asks ascending, regardless of input order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderBook {
    /// Highest bid first.
    pub bids: Vec<OrderBookLevel>,
    /// Lowest ask first.
    pub asks: Vec<OrderBookLevel>,
}

impl OrderBook {
    /// Creates a book, sorting both sides into canonical order.
    #[must_use]
    pub fn new(mut bids: Vec<OrderBookLevel>, mut asks: Vec<OrderBookLevel>) -> Self {
        bids.sort_by(|a, b| b.price.cmp(&a.price));
        asks.sort_by(|a, b| a.price.cmp(&b.price));
        Self { bids, asks }
    }

    /// Best (highest) bid price.
    #[must_use]
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    /// Best (lowest) ask price.
    #[must_use]
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }

    /// Ask minus bid; `None` unless both sides have depth.
    #[must_use]
    pub fn spread(&self) -> Option<Decimal> {
        Some(self.best_ask()? - self.best_bid()?)
    }

    /// Midpoint of the top of book; falls back to whichever side exists.
    #[must_use]
    pub fn mid(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::from(2)),
            (Some(bid), None) => Some(bid),
            (None, Some(ask)) => Some(ask),
            (None, None) => None,
        }
    }

    /// Walks the book to find how much can be filled at or inside
    /// `limit_price` with at most `budget` dollars.
    ///
    /// For buys the asks are walked ascending and a level breaks the limit
    /// when its price exceeds it; for sells the bids are walked descending
    /// and a level breaks the limit when its price falls below it. The last
    /// level contributes the fraction `remaining_budget / price` when the
    /// budget runs out mid-level.
    ///
    /// Returns `(contracts, cost)`.
    #[must_use]
    pub fn fillable(&self, side: Side, limit_price: Decimal, budget: Decimal) -> (Decimal, Decimal) {
        let levels = match side {
            Side::Buy => &self.asks,
            Side::Sell => &self.bids,
        };

        let mut contracts = Decimal::ZERO;
        let mut cost = Decimal::ZERO;

        for level in levels {
            let breaks_limit = match side {
                Side::Buy => level.price > limit_price,
                Side::Sell => level.price < limit_price,
            };
            if breaks_limit {
                break;
            }

            let remaining_budget = budget - cost;
            if remaining_budget <= Decimal::ZERO || level.price <= Decimal::ZERO {
                break;
            }

            let affordable = remaining_budget / level.price;
            let fill = level.size.min(affordable);
            contracts += fill;
            cost += fill * level.price;
        }

        (contracts, cost)
    }

    /// Total contracts offered at or below `max_price`.
    #[must_use]
    pub fn total_ask_liquidity(&self, max_price: Decimal) -> Decimal {
        self.asks
            .iter()
            .filter(|l| l.price <= max_price)
            .map(|l| l.size)
            .sum()
    }

    /// Total contracts bid at or above `min_price`.
    #[must_use]
    pub fn total_bid_liquidity(&self, min_price: Decimal) -> Decimal {
        self.bids
            .iter()
            .filter(|l| l.price >= min_price)
            .map(|l| l.size)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_book() -> OrderBook {
        OrderBook::new(
            vec![
                OrderBookLevel::new(dec!(0.46), dec!(300)),
                OrderBookLevel::new(dec!(0.48), dec!(100)),
                OrderBookLevel::new(dec!(0.47), dec!(200)),
            ],
            vec![
                OrderBookLevel::new(dec!(0.52), dec!(300)),
                OrderBookLevel::new(dec!(0.50), dec!(100)),
                OrderBookLevel::new(dec!(0.51), dec!(200)),
            ],
        )
    }

    // ==================== Ordering Tests ====================

    #[test]
    fn test_new_sorts_sides() {
        let book = sample_book();

        assert_eq!(book.bids[0].price, dec!(0.48));
        assert_eq!(book.bids[2].price, dec!(0.46));
        assert_eq!(book.asks[0].price, dec!(0.50));
        assert_eq!(book.asks[2].price, dec!(0.52));
    }

    #[test]
    fn test_top_of_book() {
        let book = sample_book();

        assert_eq!(book.best_bid(), Some(dec!(0.48)));
        assert_eq!(book.best_ask(), Some(dec!(0.50)));
        assert_eq!(book.spread(), Some(dec!(0.02)));
        assert_eq!(book.mid(), Some(dec!(0.49)));
    }

    #[test]
    fn test_empty_book() {
        let book = OrderBook::default();

        assert!(book.best_bid().is_none());
        assert!(book.best_ask().is_none());
        assert!(book.spread().is_none());
        assert!(book.mid().is_none());
    }

    #[test]
    fn test_one_sided_mid() {
        let book = OrderBook::new(vec![], vec![OrderBookLevel::new(dec!(0.60), dec!(10))]);
        assert_eq!(book.mid(), Some(dec!(0.60)));
    }

    // ==================== Fillable Tests ====================

    #[test]
    fn test_fillable_single_level_within_budget() {
        let book = sample_book();

        // 100 contracts at 0.50 cost $50; budget allows half.
        let (contracts, cost) = book.fillable(Side::Buy, dec!(0.50), dec!(25));

        assert_eq!(contracts, dec!(50));
        assert_eq!(cost, dec!(25));
    }

    #[test]
    fn test_fillable_stops_at_limit_price() {
        let book = sample_book();

        // Limit 0.50 excludes the 0.51 and 0.52 levels entirely.
        let (contracts, cost) = book.fillable(Side::Buy, dec!(0.50), dec!(1000));

        assert_eq!(contracts, dec!(100));
        assert_eq!(cost, dec!(50));
    }

    #[test]
    fn test_fillable_crosses_levels_with_fractional_tail() {
        let book = sample_book();

        // Budget $75: 100 @ 0.50 = $50, then $25 / 0.51 ≈ 49.0196 contracts.
        let (contracts, cost) = book.fillable(Side::Buy, dec!(0.52), dec!(75));

        assert_eq!(cost, dec!(75));
        let expected_tail = dec!(25) / dec!(0.51);
        assert_eq!(contracts, dec!(100) + expected_tail);
    }

    #[test]
    fn test_fillable_sell_walks_bids_down() {
        let book = sample_book();

        // Sell limit 0.47 allows the 0.48 and 0.47 levels, not 0.46.
        let (contracts, cost) = book.fillable(Side::Sell, dec!(0.47), dec!(1000));

        assert_eq!(contracts, dec!(100) + dec!(200));
        assert_eq!(cost, dec!(48) + dec!(94));
    }

    #[test]
    fn test_fillable_zero_budget() {
        let book = sample_book();
        let (contracts, cost) = book.fillable(Side::Buy, dec!(0.99), Decimal::ZERO);

        assert_eq!(contracts, Decimal::ZERO);
        assert_eq!(cost, Decimal::ZERO);
    }

    #[test]
    fn test_fillable_empty_book() {
        let book = OrderBook::default();
        let (contracts, cost) = book.fillable(Side::Buy, dec!(0.99), dec!(100));

        assert_eq!(contracts, Decimal::ZERO);
        assert_eq!(cost, Decimal::ZERO);
    }

    // ==================== Liquidity Tests ====================

    #[test]
    fn test_ask_liquidity_thresholds() {
        let book = sample_book();

        assert_eq!(book.total_ask_liquidity(dec!(0.50)), dec!(100));
        assert_eq!(book.total_ask_liquidity(dec!(0.51)), dec!(300));
        assert_eq!(book.total_ask_liquidity(dec!(1.00)), dec!(600));
    }

    #[test]
    fn test_bid_liquidity_thresholds() {
        let book = sample_book();

        assert_eq!(book.total_bid_liquidity(dec!(0.48)), dec!(100));
        assert_eq!(book.total_bid_liquidity(dec!(0.47)), dec!(300));
        assert_eq!(book.total_bid_liquidity(Decimal::ZERO), dec!(600));
    }
}
