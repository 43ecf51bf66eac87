//! Route handlers.

use crate::auth::require_bearer;
use crate::context::AppContext;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use btc_arb_arbitrage::types::ArbitrageCheck;
use btc_arb_kalshi::types::KalshiSnapshot;
use btc_arb_polymarket::types::PolymarketSnapshot;
use chrono::{SecondsFormat, Timelike, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ── Health / Config ──────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub version: &'static str,
    pub dry_run: bool,
}

/// `GET /health`
pub async fn health(State(ctx): State<Arc<AppContext>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: now_iso(),
        version: env!("CARGO_PKG_VERSION"),
        dry_run: ctx.config.trading.dry_run,
    })
}

/// `GET /config`: non-secret configuration only.
pub async fn config(State(ctx): State<Arc<AppContext>>) -> Json<Value> {
    Json(ctx.config.public_view())
}

// ── Arbitrage ────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ArbitrageResponse {
    pub timestamp: String,
    pub polymarket: Option<PolymarketSnapshot>,
    pub kalshi: Option<KalshiSnapshot>,
    pub checks: Vec<ArbitrageCheck>,
    pub opportunities: Vec<ArbitrageCheck>,
    pub errors: Vec<String>,
}

/// `GET /arbitrage`: live scan of the current hour's markets.
pub async fn arbitrage(State(ctx): State<Arc<AppContext>>) -> Json<ArbitrageResponse> {
    let mut errors = Vec::new();

    let current_price = match ctx.binance.current_price().await {
        Ok(price) => Some(price),
        Err(e) => {
            warn!(error = %e, "Reference price fetch failed");
            errors.push(format!("Binance error: {e}"));
            None
        }
    };

    // The binding strike is the open of the current UTC hour's candle.
    let target_hour = Utc::now()
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or_else(Utc::now);
    let price_to_beat = match ctx.binance.open_price(target_hour).await {
        Ok(open) => Some(open),
        Err(e) => {
            warn!(error = %e, "Reference open fetch failed");
            errors.push(format!("Binance error: {e}"));
            None
        }
    };

    let polymarket = match ctx
        .poly_data
        .fetch_by_slug(
            &ctx.config.market.poly_slug,
            price_to_beat,
            current_price,
            Some(target_hour),
        )
        .await
    {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            warn!(error = %e, "Polymarket fetch failed");
            errors.push(format!("Polymarket error: {e}"));
            None
        }
    };

    let kalshi = match ctx
        .kalshi_data
        .fetch_by_event(&ctx.config.market.kalshi_event_ticker, current_price)
        .await
    {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            warn!(error = %e, "Kalshi fetch failed");
            errors.push(format!("Kalshi error: {e}"));
            None
        }
    };

    let (checks, opportunities) = match (&polymarket, &kalshi) {
        (Some(poly), Some(kalshi)) => ctx.detector.find_opportunities(poly, kalshi),
        _ => (Vec::new(), Vec::new()),
    };

    if !opportunities.is_empty() {
        info!(count = opportunities.len(), "Arbitrage opportunities found");
    }

    Json(ArbitrageResponse {
        timestamp: now_iso(),
        polymarket,
        kalshi,
        checks,
        opportunities,
        errors,
    })
}

// ── Status / Positions / Latency / Streams ───────────────────────────────

/// `GET /status`: composite system status.
pub async fn status(State(ctx): State<Arc<AppContext>>) -> Json<Value> {
    let database = match ctx.store.stats().await {
        Ok(stats) => serde_json::to_value(stats).unwrap_or(Value::Null),
        Err(e) => {
            error!(error = %e, "Store stats failed");
            json!({ "error": "unavailable" })
        }
    };

    Json(json!({
        "timestamp": now_iso(),
        "dry_run": ctx.config.trading.dry_run,
        "risk_manager": ctx.risk.status(),
        "circuit_breaker": ctx.breaker.status(),
        "kill_switch": ctx.kill_switch.status(),
        "database": database,
    }))
}

/// `GET /positions`: open ledger and total exposure.
pub async fn positions(State(ctx): State<Arc<AppContext>>) -> Json<Value> {
    Json(json!({
        "timestamp": now_iso(),
        "open_positions": ctx.tracker.all_positions(),
        "total_exposure": ctx.tracker.total_exposure(),
        "summary": ctx.tracker.summary(),
    }))
}

/// `GET /latency`: rolling percentiles plus the last five samples.
pub async fn latency(State(ctx): State<Arc<AppContext>>) -> Json<Value> {
    Json(json!({
        "timestamp": now_iso(),
        "status": ctx.latency.status(),
        "recent": ctx.latency.recent(5),
    }))
}

/// `GET /streams`: feed-by-feed status.
pub async fn streams(State(ctx): State<Arc<AppContext>>) -> Json<Value> {
    Json(json!({
        "timestamp": now_iso(),
        "hub": ctx.hub.status(),
        "binance": ctx.feeds.binance.status(),
        "polymarket": ctx.feeds.polymarket.status(),
        "kalshi": ctx.feeds.kalshi.status(),
    }))
}

// ── Kill Switch ──────────────────────────────────────────────────────────

/// `POST /kill-switch`: authenticated global halt.
pub async fn activate_kill_switch(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, &'static str)> {
    require_bearer(
        &headers,
        ctx.config.credentials.kill_switch_token.as_ref(),
    )?;

    let reason = "API kill switch activated";
    ctx.kill_switch.activate(reason);
    ctx.risk.halt(reason);
    ctx.breaker.trip(reason);

    if let Err(e) = ctx.store.log_event("kill_switch", reason, "critical").await {
        error!(error = %e, "Failed to persist kill switch event");
        return Err((StatusCode::INTERNAL_SERVER_ERROR, "persistence failed"));
    }

    error!("Kill switch activated via API");
    Ok(Json(json!({ "status": "activated", "timestamp": now_iso() })))
}

/// `POST /kill-switch/deactivate`: authenticated resume.
pub async fn deactivate_kill_switch(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, &'static str)> {
    require_bearer(
        &headers,
        ctx.config.credentials.kill_switch_token.as_ref(),
    )?;

    ctx.kill_switch.deactivate("API deactivation");
    ctx.risk.resume("kill switch deactivated");
    ctx.breaker.reset();

    if let Err(e) = ctx
        .store
        .log_event("kill_switch", "deactivated via API", "info")
        .await
    {
        error!(error = %e, "Failed to persist kill switch event");
        return Err((StatusCode::INTERNAL_SERVER_ERROR, "persistence failed"));
    }

    info!("Kill switch deactivated via API");
    Ok(Json(json!({ "status": "deactivated", "timestamp": now_iso() })))
}
