//! Shared application context for the HTTP layer.
//!
//! The composed core is passed in by the binary; handlers receive references,
//! not a discovery mechanism.

use btc_arb_arbitrage::ArbitrageDetector;
use btc_arb_binance::{BinanceClient, BinanceFeedHandle};
use btc_arb_core::AppConfig;
use btc_arb_data::Store;
use btc_arb_execution::{LatencyTracker, PositionTracker};
use btc_arb_kalshi::{KalshiDataClient, KalshiPollFeedHandle};
use btc_arb_polymarket::{PolymarketBookFeedHandle, PolymarketDataClient};
use btc_arb_safety::{CircuitBreaker, KillSwitch, RiskManager};
use btc_arb_streams::StreamHub;
use std::sync::Arc;

/// Status handles for the three feeds.
#[derive(Clone)]
pub struct FeedHandles {
    pub binance: BinanceFeedHandle,
    pub polymarket: PolymarketBookFeedHandle,
    pub kalshi: KalshiPollFeedHandle,
}

/// Everything the operator surface needs, injected by the binary.
pub struct AppContext {
    pub config: AppConfig,
    pub detector: ArbitrageDetector,
    pub binance: BinanceClient,
    pub poly_data: PolymarketDataClient,
    pub kalshi_data: KalshiDataClient,
    pub risk: Arc<RiskManager>,
    pub breaker: Arc<CircuitBreaker>,
    pub kill_switch: Arc<KillSwitch>,
    pub tracker: Arc<PositionTracker>,
    pub latency: Arc<LatencyTracker>,
    pub hub: Arc<StreamHub>,
    pub store: Store,
    pub feeds: FeedHandles,
}
