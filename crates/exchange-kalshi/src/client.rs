//! Public Kalshi market-data client.
//!
//! Fetches the market list for an event ticker and normalizes it into a
//! [`KalshiSnapshot`]: strikes parsed from subtitles, unparseable rows
//! dropped, ladder sorted ascending. Public endpoints only, no auth.

use crate::error::{KalshiError, Result};
use crate::types::{parse_strike, KalshiMarket, KalshiSnapshot};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for the public data client.
#[derive(Debug, Clone)]
pub struct KalshiDataClientConfig {
    /// Markets endpoint, e.g. `https://api.elections.kalshi.com/trade-api/v2/markets`.
    pub api_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Transient-error retries beyond the first attempt.
    pub max_retries: u32,
}

impl Default for KalshiDataClientConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.elections.kalshi.com/trade-api/v2/markets".to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 2,
        }
    }
}

const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Deserialize)]
struct RawMarketsResponse {
    #[serde(default)]
    markets: Vec<RawMarket>,
}

#[derive(Debug, Deserialize)]
struct RawMarket {
    #[serde(default)]
    subtitle: String,
    yes_bid: Option<u32>,
    yes_ask: Option<u32>,
    no_bid: Option<u32>,
    no_ask: Option<u32>,
}

/// Public market-data client.
#[derive(Debug, Clone)]
pub struct KalshiDataClient {
    config: KalshiDataClientConfig,
    http: Client,
}

impl KalshiDataClient {
    /// Creates a client with the given configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: KalshiDataClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| KalshiError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, http })
    }

    /// Fetches the strike ladder for an event ticker.
    ///
    /// An event with zero parseable markets returns an empty snapshot, not an
    /// error; the detector treats that as "no checks".
    ///
    /// # Errors
    /// Returns a transport or API error after the retry budget is exhausted.
    pub async fn fetch_by_event(
        &self,
        event_ticker: &str,
        current_price: Option<Decimal>,
    ) -> Result<KalshiSnapshot> {
        let raw = self.get_markets(event_ticker).await?;
        let mut markets = parse_markets(raw.markets);
        markets.sort_by(|a, b| a.strike.cmp(&b.strike));

        if let Some((low, high)) = markets
            .first()
            .map(|m| m.strike)
            .zip(markets.last().map(|m| m.strike))
        {
            info!(
                event = event_ticker,
                count = markets.len(),
                %low,
                %high,
                "Kalshi strike ladder fetched"
            );
        }

        Ok(KalshiSnapshot {
            event_ticker: event_ticker.to_string(),
            current_price,
            markets,
        })
    }

    /// Fetches the raw market list for the event ticker's event.
    pub async fn fetch_raw(&self, event_ticker: &str) -> Result<serde_json::Value> {
        let mut last_error: Option<KalshiError> = None;

        for attempt in 0..=self.config.max_retries {
            match self.try_get(event_ticker).await {
                Ok(response) => {
                    return response
                        .json::<serde_json::Value>()
                        .await
                        .map_err(|e| KalshiError::Serialization(e.to_string()));
                }
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    let delay = RETRY_BASE_DELAY * 2u32.pow(attempt);
                    warn!(attempt = attempt + 1, error = %e, "Kalshi fetch failed, retrying in {:?}", delay);
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| KalshiError::Network("retries exhausted".to_string())))
    }

    async fn get_markets(&self, event_ticker: &str) -> Result<RawMarketsResponse> {
        let value = self.fetch_raw(event_ticker).await?;
        serde_json::from_value(value).map_err(KalshiError::from)
    }

    async fn try_get(&self, event_ticker: &str) -> Result<reqwest::Response> {
        let response = self
            .http
            .get(&self.config.api_url)
            .query(&[("limit", "100"), ("event_ticker", event_ticker)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(KalshiError::api(status.as_u16(), message));
        }

        Ok(response)
    }
}

/// Converts raw API rows into typed markets, dropping unparseable strikes.
fn parse_markets(raw: Vec<RawMarket>) -> Vec<KalshiMarket> {
    raw.into_iter()
        .filter_map(|m| {
            let Some(strike) = parse_strike(&m.subtitle).filter(|s| s > &Decimal::ZERO) else {
                debug!(subtitle = %m.subtitle, "Skipping market with unparseable strike");
                return None;
            };

            Some(KalshiMarket {
                strike,
                yes_bid: m.yes_bid.unwrap_or(0),
                yes_ask: m.yes_ask.unwrap_or(0),
                no_bid: m.no_bid.unwrap_or(0),
                no_ask: m.no_ask.unwrap_or(0),
                subtitle: m.subtitle,
            })
        })
        .collect()
}
