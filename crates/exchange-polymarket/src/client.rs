//! Polymarket data client.
//!
//! Resolves the hourly event through the Gamma API, extracts the two outcome
//! tokens, and pulls each token's order book from the CLOB to quote best asks.

use crate::error::{PolymarketError, Result};
use crate::orderbook::{OrderBook, OrderBookLevel};
use crate::types::PolymarketSnapshot;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for the data client.
#[derive(Debug, Clone)]
pub struct PolymarketDataClientConfig {
    /// Gamma events endpoint.
    pub gamma_url: String,
    /// CLOB book endpoint.
    pub clob_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Transient-error retries beyond the first attempt.
    pub max_retries: u32,
}

impl Default for PolymarketDataClientConfig {
    fn default() -> Self {
        Self {
            gamma_url: "https://gamma-api.polymarket.com/events".to_string(),
            clob_url: "https://clob.polymarket.com/book".to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 2,
        }
    }
}

const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Polymarket data client over Gamma + CLOB.
#[derive(Debug, Clone)]
pub struct PolymarketDataClient {
    config: PolymarketDataClientConfig,
    http: Client,
}

impl PolymarketDataClient {
    /// Creates a client with the given configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: PolymarketDataClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| PolymarketError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, http })
    }

    /// Fetches the snapshot for an event slug.
    ///
    /// `price_to_beat` (the reference open) and `current_price` come from the
    /// reference exchange; this client only fills the venue-side fields.
    ///
    /// # Errors
    /// Returns [`PolymarketError::MarketNotFound`] for missing events or a
    /// token layout other than two outcomes, plus transport/API errors.
    pub async fn fetch_by_slug(
        &self,
        slug: &str,
        price_to_beat: Option<Decimal>,
        current_price: Option<Decimal>,
        target_time_utc: Option<DateTime<Utc>>,
    ) -> Result<PolymarketSnapshot> {
        let (outcomes, token_ids) = self.resolve_tokens(slug).await?;

        let mut snapshot = PolymarketSnapshot {
            price_to_beat,
            current_price,
            slug: slug.to_string(),
            target_time_utc,
            ..Default::default()
        };

        for (outcome, token_id) in outcomes.iter().zip(token_ids.iter()) {
            let ask = match self.fetch_order_book(token_id).await {
                Ok(book) => book.best_ask(),
                Err(e) => {
                    warn!(token = %truncate(token_id), error = %e, "Order book fetch failed");
                    None
                }
            };

            match outcome.as_str() {
                "Up" => {
                    snapshot.ask_up = ask;
                    snapshot.token_up = Some(token_id.clone());
                }
                "Down" => {
                    snapshot.ask_down = ask;
                    snapshot.token_down = Some(token_id.clone());
                }
                other => warn!(outcome = other, "Unexpected outcome label"),
            }
        }

        Ok(snapshot)
    }

    /// Fetches the full order book for a token.
    ///
    /// # Errors
    /// Returns transport, API, or parse errors.
    pub async fn fetch_order_book(&self, token_id: &str) -> Result<OrderBook> {
        let value: Value = self
            .get_json(&self.config.clob_url, &[("token_id", token_id)])
            .await?;

        let bids = parse_levels(value.get("bids"))?;
        let asks = parse_levels(value.get("asks"))?;
        let book = OrderBook::new(bids, asks);

        debug!(
            token = %truncate(token_id),
            bid = ?book.best_bid(),
            ask = ?book.best_ask(),
            "Order book fetched"
        );
        Ok(book)
    }

    /// Resolves `(outcomes, token_ids)` for the event's first market.
    async fn resolve_tokens(&self, slug: &str) -> Result<(Vec<String>, Vec<String>)> {
        let events: Value = self.get_json(&self.config.gamma_url, &[("slug", slug)]).await?;

        let market = events
            .as_array()
            .and_then(|a| a.first())
            .and_then(|event| event.get("markets"))
            .and_then(Value::as_array)
            .and_then(|markets| markets.first())
            .ok_or_else(|| PolymarketError::MarketNotFound(slug.to_string()))?;

        let token_ids = parse_embedded_array(market.get("clobTokenIds"))?;
        let outcomes = parse_embedded_array(market.get("outcomes"))?;

        if token_ids.len() != 2 || outcomes.len() != 2 {
            return Err(PolymarketError::MarketNotFound(format!(
                "{slug}: expected two outcome tokens, got {}",
                token_ids.len()
            )));
        }

        Ok((outcomes, token_ids))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let mut last_error: Option<PolymarketError> = None;

        for attempt in 0..=self.config.max_retries {
            match self.try_get_json(url, params).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    let delay = RETRY_BASE_DELAY * 2u32.pow(attempt);
                    warn!(attempt = attempt + 1, error = %e, "Polymarket request failed, retrying in {:?}", delay);
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| PolymarketError::Network("retries exhausted".to_string())))
    }

    async fn try_get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let response = self.http.get(url).query(params).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PolymarketError::api(status.as_u16(), message));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| PolymarketError::Parse(e.to_string()))
    }
}

/// Gamma embeds JSON arrays as strings, e.g. `"[\"Up\",\"Down\"]"`.
fn parse_embedded_array(value: Option<&Value>) -> Result<Vec<String>> {
    let raw = value
        .and_then(Value::as_str)
        .ok_or_else(|| PolymarketError::Parse("missing embedded array field".to_string()))?;
    serde_json::from_str(raw).map_err(PolymarketError::from)
}

/// Parses CLOB book levels (`{"price": "...", "size": "..."}`).
fn parse_levels(value: Option<&Value>) -> Result<Vec<OrderBookLevel>> {
    let Some(levels) = value.and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    levels
        .iter()
        .map(|level| {
            let price = decimal_field(level, "price")?;
            let size = decimal_field(level, "size")?;
            Ok(OrderBookLevel::new(price, size))
        })
        .collect()
}

fn decimal_field(level: &Value, field: &str) -> Result<Decimal> {
    let value = level
        .get(field)
        .ok_or_else(|| PolymarketError::Parse(format!("level missing {field}")))?;

    match value {
        Value::String(s) => Decimal::from_str(s)
            .map_err(|e| PolymarketError::Parse(format!("bad {field}: {e}"))),
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .map_err(|e| PolymarketError::Parse(format!("bad {field}: {e}"))),
        _ => Err(PolymarketError::Parse(format!("bad {field} type"))),
    }
}

fn truncate(token_id: &str) -> &str {
    &token_id[..token_id.len().min(16)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_config_defaults() {
        let config = PolymarketDataClientConfig::default();
        assert!(config.gamma_url.contains("gamma-api"));
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn test_parse_embedded_array() {
        let value = json!("[\"Up\",\"Down\"]");
        let parsed = parse_embedded_array(Some(&value)).unwrap();
        assert_eq!(parsed, vec!["Up".to_string(), "Down".to_string()]);
    }

    #[test]
    fn test_parse_embedded_array_missing() {
        assert!(parse_embedded_array(None).is_err());
        assert!(parse_embedded_array(Some(&json!(42))).is_err());
    }

    #[test]
    fn test_parse_levels_string_prices() {
        let value = json!([
            { "price": "0.48", "size": "100" },
            { "price": "0.47", "size": "250.5" },
        ]);

        let levels = parse_levels(Some(&value)).unwrap();
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].price, dec!(0.48));
        assert_eq!(levels[1].size, dec!(250.5));
    }

    #[test]
    fn test_parse_levels_numeric_prices() {
        let value = json!([{ "price": 0.5, "size": 10 }]);
        let levels = parse_levels(Some(&value)).unwrap();
        assert_eq!(levels[0].price, dec!(0.5));
        assert_eq!(levels[0].size, dec!(10));
    }

    #[test]
    fn test_parse_levels_absent_side_is_empty() {
        assert!(parse_levels(None).unwrap().is_empty());
    }

    #[test]
    fn test_parse_levels_malformed_level_errors() {
        let value = json!([{ "price": "abc", "size": "1" }]);
        assert!(parse_levels(Some(&value)).is_err());
    }

    #[test]
    fn test_truncate_long_token() {
        let token = "0123456789abcdef0123456789abcdef";
        assert_eq!(truncate(token), "0123456789abcdef");
        assert_eq!(truncate("short"), "short");
    }
}
