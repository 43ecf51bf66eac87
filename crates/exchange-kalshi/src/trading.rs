//! Authenticated Kalshi trade client.
//!
//! Order placement, cancellation, and account queries over the signed trade
//! API. Every trade method logs its full intent before anything is sent, and
//! the dry-run path returns the intent without touching the network.

use crate::auth::KalshiAuth;
use crate::error::{KalshiError, Result};
use crate::types::KalshiSide;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{error, info, warn};

const ORDERS_PATH: &str = "/portfolio/orders";
const BALANCE_PATH: &str = "/portfolio/balance";
const POSITIONS_PATH: &str = "/portfolio/positions";

/// Buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderAction {
    Buy,
    Sell,
}

impl OrderAction {
    /// Lowercase wire form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

/// A fully specified order before submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderIntent {
    pub ticker: String,
    pub side: KalshiSide,
    pub action: OrderAction,
    pub count: u32,
    pub price_cents: u32,
    pub order_type: String,
}

/// Outcome of a `place_order` call.
#[derive(Debug, Clone)]
pub enum KalshiOrderResponse {
    /// Order accepted by the exchange.
    Placed {
        order_id: String,
        status: String,
        raw: Value,
    },
    /// Dry run: the intent that would have been submitted.
    DryRun { intent: OrderIntent },
}

impl KalshiOrderResponse {
    /// Venue order id, when one exists.
    #[must_use]
    pub fn order_id(&self) -> Option<&str> {
        match self {
            Self::Placed { order_id, .. } => Some(order_id),
            Self::DryRun { .. } => None,
        }
    }

    /// Returns true for the dry-run variant.
    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        matches!(self, Self::DryRun { .. })
    }
}

/// Configuration for the trade client.
#[derive(Debug, Clone)]
pub struct KalshiTradeClientConfig {
    /// Trade API base URL (without the `/portfolio/...` suffix).
    pub base_url: String,
    /// Per-request timeout for signed calls.
    pub timeout: Duration,
    /// When set, `place_order` never contacts the venue.
    pub dry_run: bool,
}

impl Default for KalshiTradeClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.elections.kalshi.com/trade-api/v2".to_string(),
            timeout: Duration::from_secs(15),
            dry_run: true,
        }
    }
}

/// Authenticated Kalshi trade client.
///
/// Built without credentials it stays in read-nothing mode: every signed call
/// returns a configuration error instead of half-performing the operation.
pub struct KalshiTradeClient {
    config: KalshiTradeClientConfig,
    http: Client,
    auth: Option<KalshiAuth>,
}

impl std::fmt::Debug for KalshiTradeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KalshiTradeClient")
            .field("base_url", &self.config.base_url)
            .field("dry_run", &self.config.dry_run)
            .field("authenticated", &self.auth.is_some())
            .finish()
    }
}

impl KalshiTradeClient {
    /// Creates a trade client. `auth` may be `None` for dry-run-only setups.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: KalshiTradeClientConfig, auth: Option<KalshiAuth>) -> Result<Self> {
        if auth.is_none() {
            warn!("Kalshi trade client built without credentials, signed calls will fail");
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| KalshiError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, http, auth })
    }

    /// Account balance in dollars (the API reports cents).
    ///
    /// # Errors
    /// Returns a configuration error without credentials, else transport/API
    /// errors.
    pub async fn get_balance(&self) -> Result<Decimal> {
        let value = self.signed_request("GET", BALANCE_PATH, None).await?;
        let cents = value
            .get("balance")
            .and_then(Value::as_i64)
            .ok_or_else(|| KalshiError::Serialization("missing balance field".to_string()))?;

        Ok(Decimal::from(cents) / Decimal::from(100))
    }

    /// Open positions as reported by the venue.
    ///
    /// # Errors
    /// Returns a configuration error without credentials, else transport/API
    /// errors.
    pub async fn get_positions(&self) -> Result<Vec<Value>> {
        let value = self.signed_request("GET", POSITIONS_PATH, None).await?;
        Ok(value
            .get("market_positions")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    /// Places a limit order.
    ///
    /// The intent is logged before submission. With dry-run configured the
    /// intent is returned unsent.
    ///
    /// # Errors
    /// Returns order rejection, transport, or configuration errors.
    pub async fn place_order(&self, intent: OrderIntent) -> Result<KalshiOrderResponse> {
        info!(
            mode = if self.config.dry_run { "DRY-RUN" } else { "LIVE" },
            ticker = %intent.ticker,
            side = %intent.side,
            action = intent.action.as_str(),
            count = intent.count,
            price_cents = intent.price_cents,
            order_type = %intent.order_type,
            "Kalshi order intent"
        );

        if self.config.dry_run {
            return Ok(KalshiOrderResponse::DryRun { intent });
        }

        let mut body = json!({
            "ticker": intent.ticker,
            "action": intent.action.as_str(),
            "side": intent.side.as_str(),
            "count": intent.count,
            "type": intent.order_type,
        });
        let price_field = match intent.side {
            KalshiSide::Yes => "yes_price",
            KalshiSide::No => "no_price",
        };
        body[price_field] = json!(intent.price_cents);

        let raw = self.signed_request("POST", ORDERS_PATH, Some(body)).await?;
        let order = raw.get("order").cloned().unwrap_or(Value::Null);
        let order_id = order
            .get("order_id")
            .and_then(Value::as_str)
            .ok_or_else(|| KalshiError::OrderRejected("no order id in response".to_string()))?
            .to_string();
        let status = order
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();

        info!(order_id = %order_id, status = %status, "Kalshi order placed");
        Ok(KalshiOrderResponse::Placed {
            order_id,
            status,
            raw,
        })
    }

    /// Cancels a pending order.
    ///
    /// # Errors
    /// Returns transport, API, or configuration errors.
    pub async fn cancel_order(&self, order_id: &str) -> Result<Value> {
        let path = format!("{ORDERS_PATH}/{order_id}");
        let result = self.signed_request("DELETE", &path, None).await;

        match &result {
            Ok(_) => info!(order_id, "Kalshi order cancelled"),
            Err(e) => error!(order_id, error = %e, "Kalshi cancel failed"),
        }
        result
    }

    /// Fetches an order's current state.
    ///
    /// # Errors
    /// Returns transport, API, or configuration errors.
    pub async fn get_order(&self, order_id: &str) -> Result<Value> {
        let path = format!("{ORDERS_PATH}/{order_id}");
        let value = self.signed_request("GET", &path, None).await?;
        Ok(value.get("order").cloned().unwrap_or(Value::Null))
    }

    async fn signed_request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value> {
        let auth = self.auth.as_ref().ok_or_else(|| {
            KalshiError::Configuration("Kalshi credentials not configured".to_string())
        })?;

        let headers = auth.sign_request(method, path)?;
        let url = format!("{}{}", self.config.base_url, path);

        let mut request = match method {
            "GET" => self.http.get(&url),
            "POST" => self.http.post(&url),
            "DELETE" => self.http.delete(&url),
            other => {
                return Err(KalshiError::InvalidOrder(format!(
                    "unsupported method: {other}"
                )))
            }
        };

        for (name, value) in headers.as_tuples() {
            request = request.header(name, value);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
                .unwrap_or_else(|| status.to_string());
            return Err(KalshiError::api(status.as_u16(), message));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| KalshiError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent() -> OrderIntent {
        OrderIntent {
            ticker: "KXBTCD-STRIKE-95500".to_string(),
            side: KalshiSide::Yes,
            action: OrderAction::Buy,
            count: 1,
            price_cents: 55,
            order_type: "limit".to_string(),
        }
    }

    #[test]
    fn test_order_action_wire_form() {
        assert_eq!(OrderAction::Buy.as_str(), "buy");
        assert_eq!(OrderAction::Sell.as_str(), "sell");
    }

    #[tokio::test]
    async fn test_dry_run_returns_intent_without_network() {
        let client = KalshiTradeClient::new(KalshiTradeClientConfig::default(), None).unwrap();

        let response = client.place_order(intent()).await.unwrap();

        assert!(response.is_dry_run());
        assert!(response.order_id().is_none());
        match response {
            KalshiOrderResponse::DryRun { intent } => {
                assert_eq!(intent.price_cents, 55);
                assert_eq!(intent.side, KalshiSide::Yes);
            }
            KalshiOrderResponse::Placed { .. } => panic!("expected dry run"),
        }
    }

    #[tokio::test]
    async fn test_signed_calls_fail_closed_without_credentials() {
        let config = KalshiTradeClientConfig {
            dry_run: false,
            ..Default::default()
        };
        let client = KalshiTradeClient::new(config, None).unwrap();

        let balance = client.get_balance().await;
        assert!(matches!(balance, Err(KalshiError::Configuration(_))));

        let order = client.place_order(intent()).await;
        assert!(matches!(order, Err(KalshiError::Configuration(_))));
    }

    #[test]
    fn test_placed_response_order_id() {
        let response = KalshiOrderResponse::Placed {
            order_id: "ord-123".to_string(),
            status: "resting".to_string(),
            raw: Value::Null,
        };

        assert_eq!(response.order_id(), Some("ord-123"));
        assert!(!response.is_dry_run());
    }

    #[test]
    fn test_price_field_depends_on_side() {
        // Yes orders carry yes_price, No orders carry no_price.
        let mut body = json!({ "ticker": "T" });
        body["yes_price"] = json!(55u32);
        assert_eq!(body["yes_price"], 55);
        assert!(body.get("no_price").is_none());
    }

    #[test]
    fn test_debug_shows_no_credentials() {
        let client = KalshiTradeClient::new(KalshiTradeClientConfig::default(), None).unwrap();
        let debug = format!("{:?}", client);
        assert!(debug.contains("authenticated: false"));
    }
}
