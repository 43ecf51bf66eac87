//! REST client for Binance reference prices.
//!
//! Two calls matter to the trader: the live ticker price (display and REST
//! fallback for the WebSocket feed) and the open of the hourly candle bound
//! to the current event, which is the Polymarket strike.

use crate::error::{BinanceError, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for the Binance REST client.
#[derive(Debug, Clone)]
pub struct BinanceClientConfig {
    /// Ticker price endpoint.
    pub price_url: String,
    /// Klines endpoint.
    pub klines_url: String,
    /// Symbol to quote (default `BTCUSDT`).
    pub symbol: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Transient-error retries beyond the first attempt.
    pub max_retries: u32,
}

impl Default for BinanceClientConfig {
    fn default() -> Self {
        Self {
            price_url: "https://api.binance.com/api/v3/ticker/price".to_string(),
            klines_url: "https://api.binance.com/api/v3/klines".to_string(),
            symbol: "BTCUSDT".to_string(),
            timeout: Duration::from_secs(5),
            max_retries: 2,
        }
    }
}

/// Base delay for the retry backoff (doubles per attempt).
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: String,
}

/// Binance REST client for reference prices.
#[derive(Debug, Clone)]
pub struct BinanceClient {
    config: BinanceClientConfig,
    http: Client,
}

impl BinanceClient {
    /// Creates a client with the given configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: BinanceClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| BinanceError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, http })
    }

    /// Returns the configured symbol.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    /// Fetches the current ticker price.
    ///
    /// # Errors
    /// Returns a transient error on transport failure (after retries) or a
    /// parse error on an unexpected payload.
    pub async fn current_price(&self) -> Result<Decimal> {
        let url = self.config.price_url.clone();
        let symbol = self.config.symbol.clone();

        let ticker: TickerPrice = self
            .get_json(&url, &[("symbol", symbol.as_str())])
            .await?;

        let price = Decimal::from_str(&ticker.price)
            .map_err(|e| BinanceError::Parse(format!("bad ticker price: {e}")))?;

        debug!(%price, "Binance current price");
        Ok(price)
    }

    /// Fetches the open of the 1h candle starting at `target_hour`.
    ///
    /// This is the reference strike for the hourly event: the contract pays
    /// out against where the underlying stands relative to this open.
    ///
    /// # Errors
    /// Returns [`BinanceError::CandleNotFound`] when the candle has not opened
    /// yet, plus the usual transport and parse errors.
    pub async fn open_price(&self, target_hour: DateTime<Utc>) -> Result<Decimal> {
        let url = self.config.klines_url.clone();
        let start_ms = target_hour.timestamp_millis().to_string();

        // Kline rows are positional arrays; index 1 is the open.
        let rows: Vec<Vec<serde_json::Value>> = self
            .get_json(
                &url,
                &[
                    ("symbol", self.config.symbol.as_str()),
                    ("interval", "1h"),
                    ("startTime", start_ms.as_str()),
                    ("limit", "1"),
                ],
            )
            .await?;

        let open_raw = rows
            .first()
            .and_then(|row| row.get(1))
            .and_then(|v| v.as_str())
            .ok_or_else(|| BinanceError::CandleNotFound(target_hour.to_rfc3339()))?;

        let open = Decimal::from_str(open_raw)
            .map_err(|e| BinanceError::Parse(format!("bad kline open: {e}")))?;

        debug!(%open, %target_hour, "Binance hourly open price");
        Ok(open)
    }

    /// GET with JSON decode and exponential-backoff retry on transient errors.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let mut last_error: Option<BinanceError> = None;

        for attempt in 0..=self.config.max_retries {
            match self.try_get_json(url, params).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    let delay = RETRY_BASE_DELAY * 2u32.pow(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max = self.config.max_retries + 1,
                        error = %e,
                        "Binance request failed, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| BinanceError::Network("retries exhausted".to_string())))
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
            return Err(BinanceError::Api {
                status_code: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| BinanceError::Parse(e.to_string()))
    }
}
