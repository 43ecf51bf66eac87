//! API server: router construction and serving.

use crate::context::AppContext;
use crate::{handlers, sse};
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Operator API server.
pub struct ApiServer {
    ctx: Arc<AppContext>,
}

impl ApiServer {
    /// Creates a server over the composed core.
    #[must_use]
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// Builds the router with all routes and layers.
    #[must_use]
    pub fn router(&self) -> Router {
        let cors = cors_layer(&self.ctx.config.server.cors_origins);

        Router::new()
            .route("/health", get(handlers::health))
            .route("/config", get(handlers::config))
            .route("/arbitrage", get(handlers::arbitrage))
            .route("/status", get(handlers::status))
            .route("/positions", get(handlers::positions))
            .route("/latency", get(handlers::latency))
            .route("/streams", get(handlers::streams))
            .route("/stream", get(sse::stream))
            .route("/kill-switch", post(handlers::activate_kill_switch))
            .route(
                "/kill-switch/deactivate",
                post(handlers::deactivate_kill_switch),
            )
            .with_state(self.ctx.clone())
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Serves until the process exits.
    ///
    /// # Errors
    /// Returns an error if the listener cannot bind or serving fails.
    pub async fn serve(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(addr, "Operator API listening");
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

/// Builds the CORS layer from configured origins; `*` opens to any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    layer.allow_origin(AllowOrigin::list(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FeedHandles;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use btc_arb_arbitrage::ArbitrageDetector;
    use btc_arb_binance::{BinanceClient, BinanceClientConfig, BinanceFeed, BinanceFeedConfig};
    use btc_arb_core::AppConfig;
    use btc_arb_data::Store;
    use btc_arb_execution::{LatencyTracker, PositionTracker};
    use btc_arb_kalshi::{
        KalshiDataClient, KalshiDataClientConfig, KalshiPollFeed, KalshiPollFeedConfig,
    };
    use btc_arb_polymarket::{
        PolymarketBookFeed, PolymarketBookFeedConfig, PolymarketDataClient,
        PolymarketDataClientConfig,
    };
    use btc_arb_safety::{CircuitBreaker, KillSwitch, RiskManager};
    use btc_arb_streams::StreamHub;
    use tower::ServiceExt;

    async fn test_context(kill_switch_token: Option<&str>) -> Arc<AppContext> {
        let mut config = AppConfig::default();
        if let Some(token) = kill_switch_token {
            config.credentials = serde_json::from_value(serde_json::json!({
                "kill_switch_token": token,
            }))
            .unwrap();
        }

        let dir = tempfile::tempdir().unwrap();
        let kill_switch = Arc::new(KillSwitch::new(dir.path().join("KILL_SWITCH")));
        // Leak the tempdir so the sentinel path stays valid for the test.
        std::mem::forget(dir);

        let hub = Arc::new(StreamHub::new());
        let events = hub.event_sender();

        let binance_feed = BinanceFeed::new(BinanceFeedConfig::default(), events.clone());
        let poly_feed = PolymarketBookFeed::new(PolymarketBookFeedConfig::default(), events.clone());
        let kalshi_feed = KalshiPollFeed::new(
            KalshiPollFeedConfig::default(),
            KalshiDataClient::new(KalshiDataClientConfig::default()).unwrap(),
            events,
        );

        let feeds = FeedHandles {
            binance: binance_feed.handle(),
            polymarket: poly_feed.handle(),
            kalshi: kalshi_feed.handle(),
        };

        Arc::new(AppContext {
            config,
            detector: ArbitrageDetector::default(),
            binance: BinanceClient::new(BinanceClientConfig::default()).unwrap(),
            poly_data: PolymarketDataClient::new(PolymarketDataClientConfig::default()).unwrap(),
            kalshi_data: KalshiDataClient::new(KalshiDataClientConfig::default()).unwrap(),
            risk: Arc::new(RiskManager::default()),
            breaker: Arc::new(CircuitBreaker::default()),
            kill_switch,
            tracker: Arc::new(PositionTracker::new()),
            latency: Arc::new(LatencyTracker::new()),
            hub,
            store: Store::in_memory().await.unwrap(),
            feeds,
        })
    }

    async fn get(router: &Router, path: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .clone()
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    async fn post_with_auth(
        router: &Router,
        path: &str,
        auth: Option<&str>,
    ) -> (StatusCode, String) {
        let mut builder = Request::builder().method("POST").uri(path);
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        let response = router
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8_lossy(&bytes).to_string())
    }

    // ==================== Read Route Tests ====================

    #[tokio::test]
    async fn test_health_reports_dry_run() {
        let ctx = test_context(None).await;
        let router = ApiServer::new(ctx).router();

        let (status, body) = get(&router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["dry_run"], true);
        assert!(body["version"].is_string());
    }

    #[tokio::test]
    async fn test_config_is_scrubbed() {
        let ctx = test_context(Some("super-secret")).await;
        let router = ApiServer::new(ctx).router();

        let (status, body) = get(&router, "/config").await;
        assert_eq!(status, StatusCode::OK);

        let rendered = body.to_string().to_lowercase();
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("token"));
        assert!(!rendered.contains("api_key"));
        assert!(!rendered.contains("private"));
        // Non-secret values survive.
        assert_eq!(body["trading"]["dry_run"], true);
    }

    #[tokio::test]
    async fn test_status_composite_shape() {
        let ctx = test_context(None).await;
        let router = ApiServer::new(ctx).router();

        let (status, body) = get(&router, "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["risk_manager"]["is_halted"], false);
        assert_eq!(body["circuit_breaker"]["state"], "closed");
        assert_eq!(body["kill_switch"]["is_active"], false);
        assert_eq!(body["database"]["trades_total"], 0);
    }

    #[tokio::test]
    async fn test_positions_empty_ledger() {
        let ctx = test_context(None).await;
        let router = ApiServer::new(ctx).router();

        let (status, body) = get(&router, "/positions").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["open_positions"].as_array().unwrap().len(), 0);
        assert_eq!(body["total_exposure"], "0");
    }

    #[tokio::test]
    async fn test_latency_and_streams_routes() {
        let ctx = test_context(None).await;
        let router = ApiServer::new(ctx).router();

        let (status, body) = get(&router, "/latency").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"]["total_trades_measured"], 0);

        let (status, body) = get(&router, "/streams").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["binance"]["connected"], false);
        assert_eq!(body["kalshi"]["poll_count"], 0);
        assert_eq!(body["hub"]["subscribers"], 0);
    }

    // ==================== Kill Switch Auth Matrix ====================

    #[tokio::test]
    async fn test_kill_switch_auth_matrix() {
        let ctx = test_context(Some("secret")).await;
        let router = ApiServer::new(ctx.clone()).router();

        // No header → 401.
        let (status, _) = post_with_auth(&router, "/kill-switch", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // Wrong token → 403 with a body that reveals nothing.
        let (status, body) = post_with_auth(&router, "/kill-switch", Some("Bearer wrong")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(!body.contains("secret"));
        assert!(!body.contains("correct"));
        assert!(!body.contains("expected"));

        // Correct token → 200 and the halt cascade fires.
        let (status, body) = post_with_auth(&router, "/kill-switch", Some("Bearer secret")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("activated"));

        let (_, status_body) = get(&router, "/status").await;
        assert_eq!(status_body["kill_switch"]["is_active"], true);
        assert_eq!(status_body["risk_manager"]["is_halted"], true);
        assert_eq!(status_body["circuit_breaker"]["state"], "open");

        // The critical event was persisted.
        let events = ctx
            .store
            .get_recent_events(10, Some("kill_switch"))
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].severity, "critical");
    }

    #[tokio::test]
    async fn test_kill_switch_deactivate_reverses_halt() {
        let ctx = test_context(Some("secret")).await;
        let router = ApiServer::new(ctx).router();

        post_with_auth(&router, "/kill-switch", Some("Bearer secret")).await;
        let (status, _) =
            post_with_auth(&router, "/kill-switch/deactivate", Some("Bearer secret")).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = get(&router, "/status").await;
        assert_eq!(body["kill_switch"]["is_active"], false);
        assert_eq!(body["risk_manager"]["is_halted"], false);
        assert_eq!(body["circuit_breaker"]["state"], "closed");
    }

    #[tokio::test]
    async fn test_kill_switch_with_no_configured_token_rejects_all() {
        let ctx = test_context(None).await;
        let router = ApiServer::new(ctx).router();

        let (status, _) = post_with_auth(&router, "/kill-switch", Some("Bearer anything")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
