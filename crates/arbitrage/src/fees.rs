//! Fee engine for dual-leg arbitrage costing.
//!
//! The model assumes the winning venue charges its fee (take the worse of the
//! two) and adds a static slippage buffer to cover quote-to-fill crossings.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Binary option payout per contract.
pub const BINARY_OPTION_PAYOUT: Decimal = dec!(1.00);

/// Fee parameters, configurable per deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeParams {
    /// Kalshi fee per winning contract.
    pub kalshi_fee_per_contract: Decimal,
    /// Approximate gas for on-chain Polymarket settlement.
    pub polymarket_gas_cost: Decimal,
    /// Safety margin for crossings between quote read and fill.
    pub slippage_buffer: Decimal,
    /// Minimum net margin for a check to count as an opportunity.
    pub min_net_margin: Decimal,
}

impl Default for FeeParams {
    fn default() -> Self {
        Self {
            kalshi_fee_per_contract: dec!(0.03),
            polymarket_gas_cost: dec!(0.002),
            slippage_buffer: dec!(0.005),
            min_net_margin: dec!(0.02),
        }
    }
}

/// Stateless fee calculator.
#[derive(Debug, Clone)]
pub struct FeeEngine {
    params: FeeParams,
}

impl FeeEngine {
    /// Creates an engine with the given parameters.
    #[must_use]
    pub fn new(params: FeeParams) -> Self {
        Self { params }
    }

    /// Returns the parameters.
    #[must_use]
    pub fn params(&self) -> &FeeParams {
        &self.params
    }

    /// Kalshi fee for one contract. Losing contracts are free.
    #[must_use]
    pub fn kalshi_fee(&self, is_winning: bool) -> Decimal {
        if is_winning {
            self.params.kalshi_fee_per_contract
        } else {
            Decimal::ZERO
        }
    }

    /// Polymarket cost overhead per trade. No explicit trading fee, only gas.
    #[must_use]
    pub fn polymarket_fee(&self) -> Decimal {
        self.params.polymarket_gas_cost
    }

    /// Worst-case total fees for a dual-leg trade: the winning venue charges,
    /// so take the max of the two, plus the slippage buffer.
    #[must_use]
    pub fn worst_case_fees(&self) -> Decimal {
        self.kalshi_fee(true).max(self.polymarket_fee()) + self.params.slippage_buffer
    }

    /// Raw total cost plus worst-case fees.
    #[must_use]
    pub fn fee_adjusted_cost(&self, raw_total_cost: Decimal) -> Decimal {
        raw_total_cost + self.worst_case_fees()
    }

    /// Net profit margin after fees and slippage. Positive means profitable.
    #[must_use]
    pub fn net_margin(&self, raw_total_cost: Decimal) -> Decimal {
        BINARY_OPTION_PAYOUT - self.fee_adjusted_cost(raw_total_cost)
    }

    /// True when the net margin meets the configured minimum.
    #[must_use]
    pub fn is_profitable(&self, raw_total_cost: Decimal) -> bool {
        self.net_margin(raw_total_cost) >= self.params.min_net_margin
    }
}

impl Default for FeeEngine {
    fn default() -> Self {
        Self::new(FeeParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Parameter Tests ====================

    #[test]
    fn test_default_params() {
        let params = FeeParams::default();

        assert_eq!(params.kalshi_fee_per_contract, dec!(0.03));
        assert_eq!(params.polymarket_gas_cost, dec!(0.002));
        assert_eq!(params.slippage_buffer, dec!(0.005));
        assert_eq!(params.min_net_margin, dec!(0.02));
    }

    // ==================== Fee Component Tests ====================

    #[test]
    fn test_kalshi_fee_only_on_winning() {
        let engine = FeeEngine::default();

        assert_eq!(engine.kalshi_fee(true), dec!(0.03));
        assert_eq!(engine.kalshi_fee(false), Decimal::ZERO);
    }

    #[test]
    fn test_worst_case_takes_larger_venue_fee() {
        let engine = FeeEngine::default();
        // max(0.03, 0.002) + 0.005
        assert_eq!(engine.worst_case_fees(), dec!(0.035));

        let gas_heavy = FeeEngine::new(FeeParams {
            kalshi_fee_per_contract: dec!(0.001),
            polymarket_gas_cost: dec!(0.01),
            ..Default::default()
        });
        assert_eq!(gas_heavy.worst_case_fees(), dec!(0.015));
    }

    // ==================== Margin Tests ====================

    #[test]
    fn test_fee_adjusted_cost() {
        let engine = FeeEngine::default();
        assert_eq!(engine.fee_adjusted_cost(dec!(0.90)), dec!(0.935));
    }

    #[test]
    fn test_net_margin() {
        let engine = FeeEngine::default();
        assert_eq!(engine.net_margin(dec!(0.90)), dec!(0.065));
        assert_eq!(engine.net_margin(dec!(1.00)), dec!(-0.035));
    }

    #[test]
    fn test_fee_monotonicity() {
        // For all raw totals r: fee_adjusted(r) > r and net_margin(r) < 1 - r.
        let engine = FeeEngine::default();
        for cents in [0u32, 25, 50, 90, 100, 150] {
            let raw = Decimal::from(cents) / dec!(100);
            assert!(engine.fee_adjusted_cost(raw) > raw);
            assert!(engine.net_margin(raw) < BINARY_OPTION_PAYOUT - raw);
        }
    }

    // ==================== Profitability Tests ====================

    #[test]
    fn test_profitability_threshold_is_strict_gte() {
        let engine = FeeEngine::default();

        // net_margin = 0.02 exactly: 1 - (raw + 0.035) = 0.02 → raw = 0.945
        assert!(engine.is_profitable(dec!(0.945)));
        // A hair above the boundary fails.
        assert!(!engine.is_profitable(dec!(0.9451)));
    }

    #[test]
    fn test_exact_dollar_total_is_not_profitable() {
        let engine = FeeEngine::default();
        assert!(!engine.is_profitable(dec!(1.00)));
    }

    #[test]
    fn test_clean_arbitrage_case() {
        let engine = FeeEngine::default();
        // Down 0.35 + Yes 0.55 = 0.90 → net 0.065.
        assert!(engine.is_profitable(dec!(0.90)));
    }
}
