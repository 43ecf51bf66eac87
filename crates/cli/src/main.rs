//! BTC hourly arbitrage trader.
//!
//! Wires the composed core together: configuration, safety stack, venue
//! clients, feeds and hub, detector, order engine, scheduler, trade loop,
//! and the operator HTTP surface. Shuts down cleanly on ctrl-c.

mod runner;
mod scheduler;

use anyhow::Result;
use btc_arb_arbitrage::{ArbitrageDetector, FeeEngine, FeeParams};
use btc_arb_binance::{BinanceClient, BinanceClientConfig, BinanceFeed, BinanceFeedConfig};
use btc_arb_core::config::{LogFormat, LoggingConfig};
use btc_arb_core::AppConfig;
use btc_arb_data::Store;
use btc_arb_execution::{EngineConfig, LatencyTracker, OrderEngine, PositionTracker};
use btc_arb_kalshi::auth::KalshiAuth;
use btc_arb_kalshi::trading::{KalshiTradeClient, KalshiTradeClientConfig};
use btc_arb_kalshi::{
    KalshiDataClient, KalshiDataClientConfig, KalshiPollFeed, KalshiPollFeedConfig,
};
use btc_arb_polymarket::trading::{PolymarketTradeClient, PolymarketTradeClientConfig};
use btc_arb_polymarket::{
    PolymarketBookFeed, PolymarketBookFeedConfig, PolymarketDataClient,
    PolymarketDataClientConfig,
};
use btc_arb_safety::{BreakerConfig, CircuitBreaker, KillSwitch, RiskLimits, RiskManager};
use btc_arb_streams::StreamHub;
use btc_arb_web_api::context::FeedHandles;
use btc_arb_web_api::{ApiServer, AppContext};
use runner::TradeRunner;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// The engine instantiation used by the live wiring.
pub type LiveOrderEngine = OrderEngine<KalshiTradeClient, PolymarketTradeClient>;

fn init_tracing(config: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match config.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

/// Builds the Kalshi signer when both credential halves are present.
fn build_kalshi_auth(config: &AppConfig) -> Option<KalshiAuth> {
    let credentials = &config.credentials;
    match (
        credentials.kalshi_api_key.as_ref(),
        credentials.kalshi_private_key.as_ref(),
    ) {
        (Some(api_key), Some(private_key)) => match KalshiAuth::new(api_key, private_key) {
            Ok(auth) => Some(auth),
            Err(e) => {
                warn!(error = %e, "Kalshi credentials invalid, running unsigned");
                None
            }
        },
        _ => None,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_tracing(&config.logging);
    info!(
        environment = %config.logging.environment,
        dry_run = config.trading.dry_run,
        "Starting BTC hourly arbitrage trader"
    );

    // Persistence and safety stack.
    let store = Store::open(&config.storage.db_path).await?;
    let risk = Arc::new(RiskManager::new(RiskLimits {
        min_net_margin: config.trading.min_net_margin,
        max_single_trade_usd: config.trading.max_single_trade_usd,
        max_total_exposure_usd: config.trading.max_total_exposure_usd,
        max_daily_loss_usd: config.trading.max_daily_loss_usd,
        max_trades_per_hour: config.trading.max_trades_per_hour,
    }));
    let breaker = Arc::new(CircuitBreaker::new(BreakerConfig::default()));
    let kill_switch = Arc::new(KillSwitch::new(config.kill_file_path.clone()));
    if kill_switch.is_active() {
        risk.halt("kill switch active on startup");
    }

    // Detector over the configured fee parameters.
    let detector = ArbitrageDetector::new(FeeEngine::new(FeeParams {
        kalshi_fee_per_contract: config.fees.kalshi_fee_per_contract,
        polymarket_gas_cost: config.fees.polymarket_gas_cost,
        slippage_buffer: config.fees.slippage_buffer,
        min_net_margin: config.trading.min_net_margin,
    }));

    // Data clients.
    let binance = BinanceClient::new(BinanceClientConfig {
        price_url: config.venues.binance_price_url.clone(),
        klines_url: config.venues.binance_klines_url.clone(),
        symbol: config.venues.binance_symbol.clone(),
        ..Default::default()
    })?;
    let poly_data = PolymarketDataClient::new(PolymarketDataClientConfig {
        gamma_url: config.venues.polymarket_gamma_url.clone(),
        clob_url: config.venues.polymarket_clob_url.clone(),
        ..Default::default()
    })?;
    let kalshi_data = KalshiDataClient::new(KalshiDataClientConfig {
        api_url: config.venues.kalshi_api_url.clone(),
        ..Default::default()
    })?;

    // Trade clients. Feeds, scheduler, and engine each get their own
    // instances rather than serialising through one.
    let kalshi_trade = KalshiTradeClient::new(
        KalshiTradeClientConfig {
            base_url: config.venues.kalshi_trade_url.clone(),
            dry_run: config.trading.dry_run,
            ..Default::default()
        },
        build_kalshi_auth(&config),
    )?;
    let poly_trade = PolymarketTradeClient::new(
        PolymarketTradeClientConfig {
            dry_run: config.trading.dry_run,
            ..Default::default()
        },
        None,
    )?;

    // Execution layer.
    let tracker = Arc::new(PositionTracker::new());
    let latency = Arc::new(LatencyTracker::new());
    let engine = Arc::new(OrderEngine::new(
        EngineConfig {
            dry_run: config.trading.dry_run,
            min_net_margin: config.trading.min_net_margin,
            max_trades_per_hour: config.trading.max_trades_per_hour,
            max_single_trade_usd: config.trading.max_single_trade_usd,
            max_total_exposure_usd: config.trading.max_total_exposure_usd,
            max_daily_loss_usd: config.trading.max_daily_loss_usd,
        },
        kalshi_trade,
        poly_trade,
        tracker.clone(),
        latency.clone(),
    ));

    // Feeds and hub. Token subscriptions come from the current market when
    // it resolves; an empty set still yields a live (idle) book feed.
    let hub = Arc::new(StreamHub::new());
    let events = hub.event_sender();

    let poly_tokens = match poly_data
        .fetch_by_slug(&config.market.poly_slug, None, None, None)
        .await
    {
        Ok(snapshot) => [snapshot.token_up, snapshot.token_down]
            .into_iter()
            .flatten()
            .collect(),
        Err(e) => {
            warn!(error = %e, "Could not resolve book tokens at startup");
            Vec::new()
        }
    };

    let binance_feed = BinanceFeed::new(
        BinanceFeedConfig {
            ws_url: config.venues.binance_ws_url.clone(),
            symbol: config.venues.binance_symbol.clone(),
            ..Default::default()
        },
        events.clone(),
    );
    let poly_feed = PolymarketBookFeed::new(
        PolymarketBookFeedConfig {
            ws_url: config.venues.polymarket_ws_url.clone(),
            token_ids: poly_tokens,
            ..Default::default()
        },
        events.clone(),
    );
    let kalshi_feed = KalshiPollFeed::new(
        KalshiPollFeedConfig {
            event_ticker: config.market.kalshi_event_ticker.clone(),
            ..Default::default()
        },
        kalshi_data.clone(),
        events,
    );

    let feeds = FeedHandles {
        binance: binance_feed.handle(),
        polymarket: poly_feed.handle(),
        kalshi: kalshi_feed.handle(),
    };

    let binance_stop = binance_feed.stop_handle();
    let poly_stop = poly_feed.stop_handle();
    let kalshi_stop = kalshi_feed.stop_handle();
    hub.own_feed(tokio::spawn(binance_feed.run()), binance_stop);
    hub.own_feed(tokio::spawn(poly_feed.run()), poly_stop);
    hub.own_feed(tokio::spawn(kalshi_feed.run()), kalshi_stop);
    hub.start();

    // Scheduler and trade loop.
    let poll_interval = Duration::from_secs_f64(config.polling_interval_secs.max(0.1));
    scheduler::spawn_all(engine.clone(), risk.clone(), breaker.clone(), poll_interval);

    let trade_runner = Arc::new(TradeRunner {
        config: config.clone(),
        detector: detector.clone(),
        binance: binance.clone(),
        poly_data: poly_data.clone(),
        kalshi_data: kalshi_data.clone(),
        engine,
        risk: risk.clone(),
        breaker: breaker.clone(),
        kill_switch: kill_switch.clone(),
        tracker: tracker.clone(),
        store: store.clone(),
        hub: hub.clone(),
    });
    trade_runner.spawn();

    // Operator surface.
    let ctx = Arc::new(AppContext {
        config,
        detector,
        binance,
        poly_data,
        kalshi_data,
        risk,
        breaker,
        kill_switch,
        tracker,
        latency,
        hub: hub.clone(),
        store,
        feeds,
    });
    let addr = format!(
        "{}:{}",
        ctx.config.server.host, ctx.config.server.port
    );
    let server = ApiServer::new(ctx);

    tokio::select! {
        result = server.serve(&addr) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
    }

    hub.stop().await;
    info!("Shutdown complete");
    Ok(())
}
