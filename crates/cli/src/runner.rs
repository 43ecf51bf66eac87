//! The detect-and-execute loop.
//!
//! Every polling interval: check the safety stack, fetch both venue
//! snapshots, run the detector, and push surviving opportunities through the
//! risk gates into the order engine. Every outcome is persisted and emitted
//! into the stream hub.

use crate::LiveOrderEngine;
use btc_arb_arbitrage::types::ArbitrageCheck;
use btc_arb_arbitrage::ArbitrageDetector;
use btc_arb_binance::BinanceClient;
use btc_arb_core::events::{EventSource, StreamEvent};
use btc_arb_core::AppConfig;
use btc_arb_data::{Store, TradeRecord};
use btc_arb_execution::{ExecutionStatus, PositionTracker};
use btc_arb_kalshi::KalshiDataClient;
use btc_arb_polymarket::PolymarketDataClient;
use btc_arb_safety::{CircuitBreaker, KillSwitch, RiskManager};
use btc_arb_streams::StreamHub;
use chrono::{Timelike, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Drives the decision-and-execution pipeline.
pub struct TradeRunner {
    pub config: AppConfig,
    pub detector: ArbitrageDetector,
    pub binance: BinanceClient,
    pub poly_data: PolymarketDataClient,
    pub kalshi_data: KalshiDataClient,
    pub engine: Arc<LiveOrderEngine>,
    pub risk: Arc<RiskManager>,
    pub breaker: Arc<CircuitBreaker>,
    pub kill_switch: Arc<KillSwitch>,
    pub tracker: Arc<PositionTracker>,
    pub store: Store,
    pub hub: Arc<StreamHub>,
}

impl TradeRunner {
    /// Spawns the loop at the configured polling interval.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let interval = std::time::Duration::from_secs_f64(
            self.config.polling_interval_secs.max(0.1),
        );
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.tick().await;
            }
        })
    }

    /// Safety-stack precheck. Returns true when trading may proceed.
    ///
    /// A kill switch seen active halts the risk manager as a side effect, so
    /// every later gate reports the same reason.
    pub fn trading_permitted(&self) -> bool {
        if self.kill_switch.is_active() {
            if !self.risk.is_halted() {
                self.risk.halt("kill switch active");
            }
            return false;
        }
        self.breaker.is_trading_allowed()
    }

    /// One scan cycle.
    pub async fn tick(&self) {
        if !self.trading_permitted() {
            return;
        }

        let Some((poly, kalshi)) = self.fetch_snapshots().await else {
            return;
        };
        self.breaker.record_data_update();

        let (checks, opportunities) = self.detector.find_opportunities(&poly, &kalshi);
        if checks.is_empty() {
            return;
        }

        self.hub.emit(StreamEvent::new(
            EventSource::Engine,
            "scan",
            serde_json::json!({
                "checks": checks.len(),
                "opportunities": opportunities.len(),
            }),
        ));

        for opportunity in opportunities {
            self.handle_opportunity(&opportunity).await;
        }
    }

    async fn fetch_snapshots(
        &self,
    ) -> Option<(
        btc_arb_polymarket::PolymarketSnapshot,
        btc_arb_kalshi::KalshiSnapshot,
    )> {
        let current_price = self.binance.current_price().await.ok();

        let target_hour = Utc::now()
            .with_minute(0)
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or_else(Utc::now);
        let price_to_beat = match self.binance.open_price(target_hour).await {
            Ok(open) => Some(open),
            Err(e) => {
                warn!(error = %e, "Reference open unavailable");
                self.breaker.record_failure("reference open fetch failed");
                return None;
            }
        };

        let poly = match self
            .poly_data
            .fetch_by_slug(
                &self.config.market.poly_slug,
                price_to_beat,
                current_price,
                Some(target_hour),
            )
            .await
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Polymarket snapshot unavailable");
                self.breaker.record_failure("polymarket fetch failed");
                return None;
            }
        };

        let kalshi = match self
            .kalshi_data
            .fetch_by_event(&self.config.market.kalshi_event_ticker, current_price)
            .await
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Kalshi snapshot unavailable");
                self.breaker.record_failure("kalshi fetch failed");
                return None;
            }
        };

        Some((poly, kalshi))
    }

    /// Gates one opportunity and executes it when allowed.
    pub async fn handle_opportunity(&self, opportunity: &ArbitrageCheck) {
        self.hub.emit(StreamEvent::new(
            EventSource::Engine,
            "opportunity",
            serde_json::to_value(opportunity).unwrap_or_default(),
        ));

        // Live risk gates; the engine re-checks its own mirror in preflight.
        let gate = self.risk.check_trade(
            opportunity.net_margin,
            opportunity.total_cost,
            self.tracker.total_exposure(),
        );

        if let Err(rejection) = gate {
            let reason = rejection.to_string();
            info!(reason = %reason, "Opportunity skipped by risk gate");
            self.persist_opportunity(opportunity, false, Some(reason.as_str()))
                .await;
            return;
        }

        let result = self.engine.execute_arbitrage(opportunity).await;
        let executed = result.status == ExecutionStatus::Success;
        self.persist_opportunity(opportunity, executed, result.error.as_deref())
            .await;

        let status_str = match result.status {
            ExecutionStatus::Success => "filled",
            ExecutionStatus::DryRun => "dry_run",
            ExecutionStatus::PreflightFailed => "preflight_failed",
            ExecutionStatus::Leg1Failed => "leg1_failed",
            ExecutionStatus::Leg2Failed => "leg2_failed",
            ExecutionStatus::Unwound => "unwound",
        };

        let record = TradeRecord {
            poly_leg: opportunity.poly_leg.to_string(),
            kalshi_leg: opportunity.kalshi_leg.to_string(),
            kalshi_strike: opportunity.kalshi_strike,
            poly_cost: opportunity.poly_cost,
            kalshi_cost: opportunity.kalshi_cost,
            total_cost: opportunity.total_cost,
            fee_adjusted_cost: opportunity.fee_adjusted_cost,
            net_margin: opportunity.net_margin,
            size_contracts: 1,
            status: status_str.to_string(),
            dry_run: self.config.trading.dry_run,
            error_message: result.error.clone(),
        };
        if let Err(e) = self.store.record_trade(&record).await {
            warn!(error = %e, "Failed to persist trade");
        }

        match result.status {
            ExecutionStatus::Success => {
                self.risk
                    .record_trade(rust_decimal::Decimal::ZERO, opportunity.total_cost);
                self.breaker.record_success();
                self.persist_positions(result.arb_id.as_deref()).await;
            }
            ExecutionStatus::Leg1Failed
            | ExecutionStatus::Leg2Failed
            | ExecutionStatus::Unwound => {
                self.breaker
                    .record_failure(result.error.as_deref().unwrap_or("execution failed"));
            }
            ExecutionStatus::DryRun | ExecutionStatus::PreflightFailed => {}
        }

        self.hub.emit(StreamEvent::new(
            EventSource::Engine,
            "execution",
            serde_json::json!({
                "status": status_str,
                "arb_id": result.arb_id,
                "error": result.error,
            }),
        ));
    }

    async fn persist_opportunity(
        &self,
        opportunity: &ArbitrageCheck,
        was_executed: bool,
        skip_reason: Option<&str>,
    ) {
        if let Err(e) = self
            .store
            .record_opportunity(
                opportunity.kalshi_strike,
                opportunity.poly_leg.as_str(),
                opportunity.kalshi_leg.as_str(),
                opportunity.poly_cost,
                opportunity.kalshi_cost,
                opportunity.total_cost,
                opportunity.net_margin,
                was_executed,
                skip_reason,
            )
            .await
        {
            warn!(error = %e, "Failed to persist opportunity");
        }
    }

    /// Write-through of the newly opened legs.
    async fn persist_positions(&self, arb_id: Option<&str>) {
        for position in self.tracker.all_positions() {
            if let Err(e) = self
                .store
                .record_position(
                    &position.id,
                    position.venue.as_str(),
                    position.side.as_str(),
                    &position.ticker,
                    position.entry_price,
                    position.size,
                    position.cost_usd,
                    position.linked_id.as_deref(),
                    arb_id,
                )
                .await
            {
                // Unique position ids make re-recording a prior leg a no-op
                // conflict; only log genuinely new failures.
                tracing::debug!(error = %e, id = %position.id, "Position write-through skipped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use btc_arb_arbitrage::types::StrikeRelation;
    use btc_arb_arbitrage::{FeeEngine, FeeParams};
    use btc_arb_binance::BinanceClientConfig;
    use btc_arb_execution::{EngineConfig, LatencyTracker, OrderEngine};
    use btc_arb_kalshi::trading::{KalshiTradeClient, KalshiTradeClientConfig};
    use btc_arb_kalshi::types::KalshiSide;
    use btc_arb_kalshi::KalshiDataClientConfig;
    use btc_arb_polymarket::trading::{PolymarketTradeClient, PolymarketTradeClientConfig};
    use btc_arb_polymarket::types::PolySide;
    use btc_arb_polymarket::PolymarketDataClientConfig;
    use rust_decimal_macros::dec;

    fn opportunity() -> ArbitrageCheck {
        ArbitrageCheck {
            kalshi_strike: dec!(95500),
            kalshi_yes: dec!(0.55),
            kalshi_no: dec!(0.47),
            relation: StrikeRelation::PolyAbove,
            poly_leg: PolySide::Down,
            kalshi_leg: KalshiSide::Yes,
            poly_cost: dec!(0.35),
            kalshi_cost: dec!(0.55),
            total_cost: dec!(0.90),
            fee_adjusted_cost: dec!(0.935),
            margin: dec!(0.10),
            net_margin: dec!(0.065),
            is_arbitrage: true,
        }
    }

    async fn runner() -> Arc<TradeRunner> {
        let config = AppConfig::default();
        let tracker = Arc::new(PositionTracker::new());
        let latency = Arc::new(LatencyTracker::new());

        let kalshi_trade =
            KalshiTradeClient::new(KalshiTradeClientConfig::default(), None).unwrap();
        let poly_trade =
            PolymarketTradeClient::new(PolymarketTradeClientConfig::default(), None).unwrap();
        let engine = Arc::new(OrderEngine::new(
            EngineConfig::default(),
            kalshi_trade,
            poly_trade,
            tracker.clone(),
            latency,
        ));

        let dir = tempfile::tempdir().unwrap();
        let kill_switch = Arc::new(KillSwitch::new(dir.path().join("KILL_SWITCH")));
        std::mem::forget(dir);

        Arc::new(TradeRunner {
            config,
            detector: ArbitrageDetector::new(FeeEngine::new(FeeParams::default())),
            binance: BinanceClient::new(BinanceClientConfig::default()).unwrap(),
            poly_data: PolymarketDataClient::new(PolymarketDataClientConfig::default()).unwrap(),
            kalshi_data: KalshiDataClient::new(KalshiDataClientConfig::default()).unwrap(),
            engine,
            risk: Arc::new(RiskManager::default()),
            breaker: Arc::new(CircuitBreaker::default()),
            kill_switch,
            tracker,
            store: Store::in_memory().await.unwrap(),
            hub: Arc::new(StreamHub::new()),
        })
    }

    #[tokio::test]
    async fn test_trading_permitted_by_default() {
        let runner = runner().await;
        assert!(runner.trading_permitted());
    }

    #[tokio::test]
    async fn test_kill_switch_blocks_and_halts_risk() {
        let runner = runner().await;
        runner.kill_switch.activate("test stop");

        assert!(!runner.trading_permitted());
        assert!(runner.risk.is_halted());
    }

    #[tokio::test]
    async fn test_open_breaker_blocks() {
        let runner = runner().await;
        runner.breaker.trip("manual");
        assert!(!runner.trading_permitted());
    }

    #[tokio::test]
    async fn test_handle_opportunity_dry_run_persists_everything() {
        let runner = runner().await;
        let mut subscription = runner.hub.subscribe();

        runner.handle_opportunity(&opportunity()).await;

        // Dry run: a trade row with dry_run status, no positions opened.
        let trades = runner.store.get_trades_today().await.unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].status, "dry_run");
        assert_eq!(trades[0].dry_run, 1);
        assert_eq!(runner.tracker.open_position_count(), 0);

        // The opportunity was mirrored into the event log.
        let events = runner.store.get_events(Some("opportunity"), 1).await.unwrap();
        assert_eq!(events.len(), 1);

        // Hub saw the opportunity and the execution outcome.
        let first = subscription.try_recv().unwrap();
        assert_eq!(first.event_type, "opportunity");
        let second = subscription.try_recv().unwrap();
        assert_eq!(second.event_type, "execution");
        assert_eq!(second.payload["status"], "dry_run");
    }

    #[tokio::test]
    async fn test_risk_rejection_records_skip_reason() {
        let runner = runner().await;
        runner.risk.halt("halted for test");

        runner.handle_opportunity(&opportunity()).await;

        // No trade row; the opportunity row carries the skip reason.
        assert!(runner.store.get_trades_today().await.unwrap().is_empty());
        let events = runner.store.get_events(Some("opportunity"), 1).await.unwrap();
        assert_eq!(events.len(), 1);
    }
}
