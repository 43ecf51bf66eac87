//! Dual-leg order engine.
//!
//! A fixed pipeline per opportunity: preflight → dry-run gate → leg 1
//! (Kalshi, the lower-latency order path) → leg 2 (Polymarket, FOK) →
//! record. A leg-2 failure triggers an unwind of leg 1 so no naked position
//! survives a failure. Leg 1 is never retried and a leg-1 failure aborts the
//! attempt; partial fills are modelled as leg failures.

use crate::latency::LatencyTracker;
use crate::positions::{PositionSide, PositionTracker, TrackerSummary, Venue};
use async_trait::async_trait;
use btc_arb_arbitrage::types::ArbitrageCheck;
use btc_arb_kalshi::error::KalshiError;
use btc_arb_kalshi::trading::{
    KalshiOrderResponse, KalshiTradeClient, OrderAction, OrderIntent,
};
use btc_arb_kalshi::types::KalshiSide;
use btc_arb_polymarket::error::PolymarketError;
use btc_arb_polymarket::trading::{
    PolyOrderIntent, PolyOrderType, PolymarketOrderResponse, PolymarketTradeClient,
};
use btc_arb_polymarket::types::{PolySide, Side};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

// =============================================================================
// Venue trading traits
// =============================================================================

/// Order operations the engine needs from the Kalshi side.
#[async_trait]
pub trait KalshiTrading: Send + Sync {
    /// Places a limit order.
    async fn place_order(&self, intent: OrderIntent) -> Result<KalshiOrderResponse, KalshiError>;

    /// Cancels a pending order.
    async fn cancel_order(&self, order_id: &str) -> Result<serde_json::Value, KalshiError>;
}

/// Order operations the engine needs from the Polymarket side.
#[async_trait]
pub trait PolymarketTrading: Send + Sync {
    /// Places a fill-or-kill order.
    async fn place_order(
        &self,
        intent: PolyOrderIntent,
    ) -> Result<PolymarketOrderResponse, PolymarketError>;
}

#[async_trait]
impl KalshiTrading for KalshiTradeClient {
    async fn place_order(&self, intent: OrderIntent) -> Result<KalshiOrderResponse, KalshiError> {
        KalshiTradeClient::place_order(self, intent).await
    }

    async fn cancel_order(&self, order_id: &str) -> Result<serde_json::Value, KalshiError> {
        KalshiTradeClient::cancel_order(self, order_id).await
    }
}

#[async_trait]
impl PolymarketTrading for PolymarketTradeClient {
    async fn place_order(
        &self,
        intent: PolyOrderIntent,
    ) -> Result<PolymarketOrderResponse, PolymarketError> {
        PolymarketTradeClient::place_order(self, intent).await
    }
}

// =============================================================================
// Results
// =============================================================================

/// Terminal status of one execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Both legs filled and recorded.
    Success,
    /// Dry-run configuration stopped the attempt before any venue contact.
    DryRun,
    /// A risk mirror gate failed.
    PreflightFailed,
    /// Leg 1 (Kalshi) failed; nothing to unwind.
    Leg1Failed,
    /// Leg 2 failed and the unwind of leg 1 also failed.
    Leg2Failed,
    /// Leg 2 failed and leg 1 was successfully unwound.
    Unwound,
}

/// Result of an arbitrage execution attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub opportunity: ArbitrageCheck,
    /// Pair id in the position ledger, on success.
    pub arb_id: Option<String>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionResult {
    fn new(status: ExecutionStatus, opportunity: &ArbitrageCheck) -> Self {
        Self {
            status,
            opportunity: opportunity.clone(),
            arb_id: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Returns true only for a fully recorded dual-leg fill.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Engine limits: the in-engine mirror of the risk gates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// SAFE DEFAULT: no live trades until explicitly disabled.
    pub dry_run: bool,
    pub min_net_margin: Decimal,
    pub max_trades_per_hour: u32,
    pub max_single_trade_usd: Decimal,
    pub max_total_exposure_usd: Decimal,
    pub max_daily_loss_usd: Decimal,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dry_run: true,
            min_net_margin: Decimal::new(2, 2),
            max_trades_per_hour: 20,
            max_single_trade_usd: Decimal::from(50),
            max_total_exposure_usd: Decimal::from(500),
            max_daily_loss_usd: Decimal::from(100),
        }
    }
}

/// Engine status for the operator surface.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub dry_run: bool,
    pub trades_this_hour: u32,
    pub max_trades_per_hour: u32,
    pub daily_loss: Decimal,
    pub max_daily_loss_usd: Decimal,
    pub positions: TrackerSummary,
}

#[derive(Debug, Default)]
struct EngineState {
    trades_this_hour: u32,
    daily_loss: Decimal,
}

/// Dual-leg arbitrage order engine.
///
/// The caller must not invoke `execute_arbitrage` concurrently for the same
/// opportunity; each call is single-flight per call site.
pub struct OrderEngine<K: KalshiTrading, P: PolymarketTrading> {
    config: EngineConfig,
    kalshi: K,
    poly: P,
    tracker: Arc<PositionTracker>,
    latency: Arc<LatencyTracker>,
    state: Mutex<EngineState>,
}

impl<K: KalshiTrading, P: PolymarketTrading> OrderEngine<K, P> {
    /// Creates an engine over the two venue trade clients.
    #[must_use]
    pub fn new(
        config: EngineConfig,
        kalshi: K,
        poly: P,
        tracker: Arc<PositionTracker>,
        latency: Arc<LatencyTracker>,
    ) -> Self {
        info!(
            dry_run = config.dry_run,
            max_trade = %config.max_single_trade_usd,
            max_exposure = %config.max_total_exposure_usd,
            "OrderEngine initialized"
        );
        Self {
            config,
            kalshi,
            poly,
            tracker,
            latency,
            state: Mutex::new(EngineState::default()),
        }
    }

    /// Returns the position tracker.
    #[must_use]
    pub fn tracker(&self) -> &Arc<PositionTracker> {
        &self.tracker
    }

    /// Executes a dual-leg arbitrage trade.
    pub async fn execute_arbitrage(&self, opportunity: &ArbitrageCheck) -> ExecutionResult {
        info!(
            relation = %opportunity.relation,
            strike = %opportunity.kalshi_strike,
            net_margin = %opportunity.net_margin,
            dry_run = self.config.dry_run,
            "Executing arbitrage: {}",
            opportunity.describe()
        );

        // Step 1: preflight.
        if let Err(reason) = self.preflight(opportunity) {
            warn!(reason, "Preflight failed");
            return ExecutionResult::new(ExecutionStatus::PreflightFailed, opportunity)
                .with_error(reason);
        }

        // Step 2: dry-run gate. No venue contact past this point in dry-run.
        if self.config.dry_run {
            info!(
                net_margin = %opportunity.net_margin,
                "Dry-run: would execute trade"
            );
            return ExecutionResult::new(ExecutionStatus::DryRun, opportunity);
        }

        let mut measurement = self.latency.start_measurement("");

        // Step 3: leg 1 on the faster venue.
        measurement.mark_leg1_sent();
        let leg1 = match self.kalshi.place_order(kalshi_intent(opportunity)).await {
            Ok(response) => {
                measurement.mark_leg1_filled();
                response
            }
            Err(e) => {
                error!(error = %e, "Leg 1 (Kalshi) failed");
                return ExecutionResult::new(ExecutionStatus::Leg1Failed, opportunity)
                    .with_error(format!("Kalshi leg failed: {e}"));
            }
        };

        // Step 4: leg 2, fill-or-kill.
        measurement.mark_leg2_sent();
        match self.poly.place_order(poly_intent(opportunity)).await {
            Ok(_) => measurement.mark_leg2_filled(),
            Err(e) => {
                error!(error = %e, "Leg 2 (Polymarket) failed, attempting unwind");
                return self.unwind_leg1(opportunity, &leg1, &e).await;
            }
        }

        // Step 5: record both legs and the pair.
        let arb_id = self.record_positions(opportunity);
        {
            let mut state = self.state.lock();
            state.trades_this_hour += 1;
        }
        self.latency.complete_measurement(measurement);

        info!(arb_id = %arb_id, net_margin = %opportunity.net_margin, "Arbitrage executed");
        let mut result = ExecutionResult::new(ExecutionStatus::Success, opportunity);
        result.arb_id = Some(arb_id);
        result
    }

    /// Mirror of the risk gates: margin, rate, exposure, single-trade,
    /// daily-loss. Returns the first failing reason.
    fn preflight(&self, opportunity: &ArbitrageCheck) -> Result<(), String> {
        if opportunity.net_margin < self.config.min_net_margin {
            return Err(format!(
                "Net margin ${} below min ${}",
                opportunity.net_margin, self.config.min_net_margin
            ));
        }

        let state = self.state.lock();
        if state.trades_this_hour >= self.config.max_trades_per_hour {
            return Err(format!(
                "Rate limit: {}/{} trades this hour",
                state.trades_this_hour, self.config.max_trades_per_hour
            ));
        }
        let daily_loss = state.daily_loss;
        drop(state);

        let trade_cost = opportunity.total_cost;
        let current_exposure = self.tracker.total_exposure();
        if current_exposure + trade_cost > self.config.max_total_exposure_usd {
            return Err(format!(
                "Exposure limit: ${current_exposure} + ${trade_cost} > ${}",
                self.config.max_total_exposure_usd
            ));
        }

        if trade_cost > self.config.max_single_trade_usd {
            return Err(format!(
                "Single trade ${trade_cost} > max ${}",
                self.config.max_single_trade_usd
            ));
        }

        if daily_loss >= self.config.max_daily_loss_usd {
            return Err(format!(
                "Daily loss ${daily_loss} >= max ${}",
                self.config.max_daily_loss_usd
            ));
        }

        Ok(())
    }

    /// Cancels the Kalshi order after a leg-2 failure.
    ///
    /// No leg-1 order id means there is nothing to unwind.
    async fn unwind_leg1(
        &self,
        opportunity: &ArbitrageCheck,
        leg1: &KalshiOrderResponse,
        leg2_error: &PolymarketError,
    ) -> ExecutionResult {
        let Some(order_id) = leg1.order_id() else {
            warn!("No leg-1 order id, nothing to unwind");
            return ExecutionResult::new(ExecutionStatus::Unwound, opportunity)
                .with_error(format!("Poly leg failed: {leg2_error}. Nothing to unwind"));
        };

        info!(order_id, "Attempting to cancel Kalshi leg");
        match self.kalshi.cancel_order(order_id).await {
            Ok(_) => {
                info!(order_id, "Kalshi leg cancelled");
                ExecutionResult::new(ExecutionStatus::Unwound, opportunity).with_error(format!(
                    "Poly leg failed: {leg2_error}. Unwind: success"
                ))
            }
            Err(e) => {
                error!(order_id, error = %e, "UNWIND FAILED, naked Kalshi position");
                ExecutionResult::new(ExecutionStatus::Leg2Failed, opportunity).with_error(
                    format!("Poly leg failed: {leg2_error}. Unwind: FAILED ({e})"),
                )
            }
        }
    }

    /// Opens both legs in the ledger and pairs them.
    fn record_positions(&self, opportunity: &ArbitrageCheck) -> String {
        let kalshi_side = match opportunity.kalshi_leg {
            KalshiSide::Yes => PositionSide::Long,
            KalshiSide::No => PositionSide::Short,
        };
        let poly_side = match opportunity.poly_leg {
            PolySide::Up => PositionSide::Long,
            PolySide::Down => PositionSide::Short,
        };

        let kalshi_pos = self.tracker.open_position(
            Venue::Kalshi,
            kalshi_side,
            format!("KXBTCD-{}", opportunity.kalshi_strike.trunc()),
            opportunity.kalshi_cost,
            1,
            None,
        );
        let poly_pos = self.tracker.open_position(
            Venue::Polymarket,
            poly_side,
            format!("poly-{}", opportunity.poly_leg),
            opportunity.poly_cost,
            1,
            Some(kalshi_pos.id.clone()),
        );

        self.tracker
            .open_arbitrage(&kalshi_pos.id, &poly_pos.id, opportunity.net_margin)
            .map_or_else(|| "ARB-UNPAIRED".to_string(), |pair| pair.id)
    }

    /// Resets the hourly trade counter. Called on the hour boundary.
    pub fn reset_hourly_counter(&self) {
        self.state.lock().trades_this_hour = 0;
        info!("Trade counter reset for new hour");
    }

    /// Resets the daily loss tracker. Called at midnight UTC.
    pub fn reset_daily_loss(&self) {
        self.state.lock().daily_loss = Decimal::ZERO;
        info!("Daily loss tracker reset");
    }

    /// Records a realized loss against the daily limit.
    pub fn record_loss(&self, loss: Decimal) {
        let mut state = self.state.lock();
        state.daily_loss += loss;
    }

    /// Engine status for monitoring.
    #[must_use]
    pub fn status(&self) -> EngineStatus {
        let state = self.state.lock();
        EngineStatus {
            dry_run: self.config.dry_run,
            trades_this_hour: state.trades_this_hour,
            max_trades_per_hour: self.config.max_trades_per_hour,
            daily_loss: state.daily_loss,
            max_daily_loss_usd: self.config.max_daily_loss_usd,
            positions: self.tracker.summary(),
        }
    }
}

/// Leg-1 order for the chosen Kalshi side at the quoted price.
///
/// The ticker mapping from `(event, strike)` is resolved by the market
/// discovery collaborator; this placeholder covers the hourly BTC series.
fn kalshi_intent(opportunity: &ArbitrageCheck) -> OrderIntent {
    OrderIntent {
        ticker: format!("KXBTCD-STRIKE-{}", opportunity.kalshi_strike.trunc()),
        side: opportunity.kalshi_leg,
        action: OrderAction::Buy,
        count: 1,
        price_cents: (opportunity.kalshi_cost * Decimal::from(100))
            .trunc()
            .to_u32()
            .unwrap_or(0),
        order_type: "limit".to_string(),
    }
}

/// Leg-2 fill-or-kill order at the quoted price.
fn poly_intent(opportunity: &ArbitrageCheck) -> PolyOrderIntent {
    PolyOrderIntent {
        token_id: "placeholder_token_id".to_string(),
        side: Side::Buy,
        price: opportunity.poly_cost,
        size: Decimal::ONE,
        order_type: PolyOrderType::Fok,
    }
}
