//! Polymarket CLOB trade client.
//!
//! Places orders against the CLOB with L2 (HMAC-SHA256) header auth. FOK is
//! the default order type: an arbitrage leg either fills whole or not at all.
//! The dry-run path returns the intent without touching the network.

use crate::error::{PolymarketError, Result};
use crate::types::Side;
use base64::engine::general_purpose::URL_SAFE as BASE64_URL;
use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// CLOB order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PolyOrderType {
    /// Fill-or-kill: fill entirely at the limit or reject.
    Fok,
    /// Fill-and-kill: fill what is available, cancel the rest.
    Fak,
    /// Good-till-cancelled: rest on the book.
    Gtc,
}

impl PolyOrderType {
    /// Uppercase wire form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fok => "FOK",
            Self::Fak => "FAK",
            Self::Gtc => "GTC",
        }
    }
}

/// A fully specified CLOB order before submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolyOrderIntent {
    pub token_id: String,
    pub side: Side,
    /// Price per contract in `(0, 1)`.
    pub price: Decimal,
    pub size: Decimal,
    pub order_type: PolyOrderType,
}

/// Outcome of a `place_order` call.
#[derive(Debug, Clone)]
pub enum PolymarketOrderResponse {
    /// Order accepted by the CLOB.
    Placed { order_id: String, raw: Value },
    /// Dry run: the intent that would have been submitted.
    DryRun { intent: PolyOrderIntent },
}

impl PolymarketOrderResponse {
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

/// L2 credentials for CLOB header auth.
#[derive(Clone)]
pub struct ClobCredentials {
    pub api_key: String,
    /// URL-safe base64 HMAC secret.
    pub secret: SecretString,
    pub passphrase: SecretString,
    /// Funder wallet address.
    pub address: String,
}

impl std::fmt::Debug for ClobCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClobCredentials")
            .field("api_key", &"[REDACTED]")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl ClobCredentials {
    /// Computes the L2 signature over `timestamp + METHOD + path + body`.
    fn sign(&self, timestamp: &str, method: &str, path: &str, body: &str) -> Result<String> {
        let key = BASE64_URL
            .decode(self.secret.expose_secret())
            .map_err(|e| PolymarketError::Configuration(format!("bad CLOB secret: {e}")))?;

        let mut mac = HmacSha256::new_from_slice(&key)
            .map_err(|e| PolymarketError::Configuration(format!("bad CLOB secret: {e}")))?;
        mac.update(format!("{timestamp}{method}{path}{body}").as_bytes());

        Ok(BASE64_URL.encode(mac.finalize().into_bytes()))
    }
}

/// Configuration for the trade client.
#[derive(Debug, Clone)]
pub struct PolymarketTradeClientConfig {
    /// CLOB host, e.g. `https://clob.polymarket.com`.
    pub clob_host: String,
    /// Per-request timeout for signed calls.
    pub timeout: Duration,
    /// When set, `place_order` never contacts the venue.
    pub dry_run: bool,
}

impl Default for PolymarketTradeClientConfig {
    fn default() -> Self {
        Self {
            clob_host: "https://clob.polymarket.com".to_string(),
            timeout: Duration::from_secs(15),
            dry_run: true,
        }
    }
}

/// Polymarket CLOB trade client.
pub struct PolymarketTradeClient {
    config: PolymarketTradeClientConfig,
    http: Client,
    credentials: Option<ClobCredentials>,
}

impl std::fmt::Debug for PolymarketTradeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolymarketTradeClient")
            .field("clob_host", &self.config.clob_host)
            .field("dry_run", &self.config.dry_run)
            .field("authenticated", &self.credentials.is_some())
            .finish()
    }
}

impl PolymarketTradeClient {
    /// Creates a trade client. `credentials` may be `None` for dry-run-only
    /// setups.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        config: PolymarketTradeClientConfig,
        credentials: Option<ClobCredentials>,
    ) -> Result<Self> {
        if credentials.is_none() {
            warn!("Polymarket trade client built without credentials, signed calls will fail");
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| PolymarketError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            http,
            credentials,
        })
    }

    /// Places an order, FOK unless the intent says otherwise.
    ///
    /// The intent is logged before submission, with the token id truncated.
    ///
    /// # Errors
    /// Returns order rejection, transport, or configuration errors.
    pub async fn place_order(&self, intent: PolyOrderIntent) -> Result<PolymarketOrderResponse> {
        info!(
            mode = if self.config.dry_run { "DRY-RUN" } else { "LIVE" },
            token = %truncate(&intent.token_id),
            side = %intent.side,
            price = %intent.price,
            size = %intent.size,
            order_type = intent.order_type.as_str(),
            "Polymarket order intent"
        );

        if self.config.dry_run {
            return Ok(PolymarketOrderResponse::DryRun { intent });
        }

        let client_order_id = Uuid::new_v4().to_string();
        let body = json!({
            "order": {
                "tokenID": intent.token_id,
                "price": intent.price,
                "size": intent.size,
                "side": intent.side.as_str(),
                "orderType": intent.order_type.as_str(),
                "clientOrderID": client_order_id,
            }
        });

        let raw = self.signed_post("/order", &body).await?;
        let order_id = raw
            .get("orderID")
            .and_then(Value::as_str)
            .ok_or_else(|| PolymarketError::OrderRejected("no order id in response".to_string()))?
            .to_string();

        info!(order_id = %order_id, "Polymarket order placed");
        Ok(PolymarketOrderResponse::Placed { order_id, raw })
    }

    /// USDC balance. There is no authoritative on-chain pathway here, so this
    /// reports zero with an informational note once credentials are present.
    ///
    /// # Errors
    /// Returns a configuration error without credentials.
    pub fn get_balance(&self) -> Result<(Decimal, Option<String>)> {
        if self.credentials.is_none() {
            return Err(PolymarketError::Configuration(
                "Polymarket credentials not configured".to_string(),
            ));
        }

        Ok((
            Decimal::ZERO,
            Some("balance check requires an on-chain query".to_string()),
        ))
    }

    /// Open positions. The CLOB does not expose positions; the in-memory
    /// ledger is authoritative.
    #[must_use]
    pub fn get_positions(&self) -> Vec<Value> {
        Vec::new()
    }

    /// One-time USDC / conditional-token allowance approval.
    ///
    /// # Errors
    /// Live approval is an on-chain transaction this adapter cannot perform;
    /// it returns a configuration error rather than half-performing it.
    pub fn set_allowances(&self) -> Result<()> {
        info!(
            mode = if self.config.dry_run { "DRY-RUN" } else { "LIVE" },
            "Set allowances requested"
        );

        if self.config.dry_run {
            return Ok(());
        }

        Err(PolymarketError::Configuration(
            "allowance approval requires on-chain wallet tooling".to_string(),
        ))
    }

    async fn signed_post(&self, path: &str, body: &Value) -> Result<Value> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            PolymarketError::Configuration("Polymarket credentials not configured".to_string())
        })?;

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| PolymarketError::Configuration(format!("clock error: {e}")))?
            .as_secs()
            .to_string();
        let body_text = body.to_string();
        let signature = credentials.sign(&timestamp, "POST", path, &body_text)?;

        let url = format!("{}{}", self.config.clob_host, path);
        let response = self
            .http
            .post(&url)
            .header("POLY_ADDRESS", &credentials.address)
            .header("POLY_SIGNATURE", signature)
            .header("POLY_TIMESTAMP", &timestamp)
            .header("POLY_API_KEY", &credentials.api_key)
            .header(
                "POLY_PASSPHRASE",
                credentials.passphrase.expose_secret(),
            )
            .header("Content-Type", "application/json")
            .body(body_text)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PolymarketError::api(status.as_u16(), message));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| PolymarketError::Parse(e.to_string()))
    }
}

fn truncate(token_id: &str) -> &str {
    &token_id[..token_id.len().min(16)]
}
