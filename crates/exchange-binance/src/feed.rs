//! Real-time reference-price feed over the Binance ticker WebSocket.
//!
//! Maintains the latest `(price, last_update)` pair and forwards every valid
//! tick into the stream hub. Reconnects with exponential backoff (1 s doubling
//! to 60 s); a successful connect resets the backoff.

use btc_arb_core::events::StreamEvent;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Configuration for the ticker feed.
#[derive(Debug, Clone)]
pub struct BinanceFeedConfig {
    /// Full stream URL, e.g. `wss://stream.binance.com:9443/ws/btcusdt@ticker`.
    pub ws_url: String,
    /// Symbol reported in emitted events.
    pub symbol: String,
    /// Backoff cap for reconnects.
    pub max_reconnect_delay: Duration,
}

impl Default for BinanceFeedConfig {
    fn default() -> Self {
        Self {
            ws_url: "wss://stream.binance.com:9443/ws/btcusdt@ticker".to_string(),
            symbol: "BTCUSDT".to_string(),
            max_reconnect_delay: Duration::from_secs(60),
        }
    }
}

/// Binance 24h ticker message. Only the last price is consumed.
#[derive(Debug, Deserialize)]
struct TickerEvent {
    /// Last traded price.
    #[serde(rename = "c")]
    last_price: String,
}

/// Feed status for the operator surface. No secrets.
#[derive(Debug, Clone, Serialize)]
pub struct BinanceFeedStatus {
    pub connected: bool,
    pub price: Option<f64>,
    pub last_update: Option<DateTime<Utc>>,
    /// Seconds since the latest tick; `None` if never updated.
    pub age_seconds: Option<f64>,
    pub message_count: u64,
    pub error_count: u64,
}

#[derive(Debug)]
struct FeedShared {
    price: RwLock<Option<f64>>,
    last_update: RwLock<Option<(Instant, DateTime<Utc>)>>,
    connected: AtomicBool,
    message_count: AtomicU64,
    error_count: AtomicU64,
}

impl FeedShared {
    fn new() -> Self {
        Self {
            price: RwLock::new(None),
            last_update: RwLock::new(None),
            connected: AtomicBool::new(false),
            message_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
        }
    }
}

/// Cheap cloneable view of the feed state.
#[derive(Debug, Clone)]
pub struct BinanceFeedHandle {
    shared: Arc<FeedShared>,
}

impl BinanceFeedHandle {
    /// Latest price, if any tick has arrived.
    #[must_use]
    pub fn price(&self) -> Option<f64> {
        *self.shared.price.read()
    }

    /// Age of the latest tick; `None` if never updated.
    #[must_use]
    pub fn age(&self) -> Option<Duration> {
        self.shared
            .last_update
            .read()
            .map(|(instant, _)| instant.elapsed())
    }

    /// Whether the socket is currently connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Full status block.
    #[must_use]
    pub fn status(&self) -> BinanceFeedStatus {
        let last = *self.shared.last_update.read();
        BinanceFeedStatus {
            connected: self.is_connected(),
            price: self.price(),
            last_update: last.map(|(_, at)| at),
            age_seconds: last.map(|(instant, _)| instant.elapsed().as_secs_f64()),
            message_count: self.shared.message_count.load(Ordering::Relaxed),
            error_count: self.shared.error_count.load(Ordering::Relaxed),
        }
    }
}

/// Persistent reference-price feed.
pub struct BinanceFeed {
    config: BinanceFeedConfig,
    shared: Arc<FeedShared>,
    events: UnboundedSender<StreamEvent>,
    should_stop: Arc<AtomicBool>,
}

impl BinanceFeed {
    /// Creates a feed that reports ticks into the given event channel.
    #[must_use]
    pub fn new(config: BinanceFeedConfig, events: UnboundedSender<StreamEvent>) -> Self {
        Self {
            config,
            shared: Arc::new(FeedShared::new()),
            events,
            should_stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns a shared view of the feed state.
    #[must_use]
    pub fn handle(&self) -> BinanceFeedHandle {
        BinanceFeedHandle {
            shared: self.shared.clone(),
        }
    }

    /// Returns the cooperative stop flag.
    #[must_use]
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.should_stop.clone()
    }

    /// Runs the feed until the stop flag is set.
    pub async fn run(self) {
        let mut reconnect_delay = Duration::from_secs(1);
        info!(url = %self.config.ws_url, "Starting Binance reference-price feed");

        loop {
            if self.should_stop.load(Ordering::SeqCst) {
                break;
            }

            match self.connect_and_stream(&mut reconnect_delay).await {
                Ok(()) => break,
                Err(e) => {
                    self.shared.connected.store(false, Ordering::SeqCst);
                    self.shared.error_count.fetch_add(1, Ordering::Relaxed);
                    if self.should_stop.load(Ordering::SeqCst) {
                        break;
                    }
                    warn!(
                        error = %e,
                        "Binance feed disconnected, reconnecting in {:?}",
                        reconnect_delay
                    );
                    tokio::time::sleep(reconnect_delay).await;
                    reconnect_delay =
                        (reconnect_delay * 2).min(self.config.max_reconnect_delay);
                }
            }
        }

        self.shared.connected.store(false, Ordering::SeqCst);
        info!("Binance reference-price feed stopped");
    }

    async fn connect_and_stream(
        &self,
        reconnect_delay: &mut Duration,
    ) -> Result<(), tokio_tungstenite::tungstenite::Error> {
        let (ws, _) = tokio_tungstenite::connect_async(&self.config.ws_url).await?;
        self.shared.connected.store(true, Ordering::SeqCst);
        *reconnect_delay = Duration::from_secs(1);
        info!("Binance feed connected");

        let (_, mut read) = ws.split();

        while let Some(msg) = read.next().await {
            if self.should_stop.load(Ordering::SeqCst) {
                return Ok(());
            }

            match msg {
                Ok(Message::Text(text)) => self.process_message(&text),
                Ok(Message::Close(_)) => {
                    warn!("Binance feed socket closed by peer");
                    return Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed);
                }
                Ok(_) => {}
                Err(e) => return Err(e),
            }
        }

        Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed)
    }

    /// Parses one ticker message and updates shared state.
    ///
    /// Non-positive prices and malformed payloads are dropped: the message
    /// counts toward the error counter and processing continues.
    fn process_message(&self, raw: &str) {
        let price = match serde_json::from_str::<TickerEvent>(raw) {
            Ok(event) => event.last_price.parse::<f64>().unwrap_or(0.0),
            Err(e) => {
                self.shared.error_count.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Bad Binance ticker message");
                return;
            }
        };

        if price <= 0.0 {
            return;
        }

        *self.shared.price.write() = Some(price);
        *self.shared.last_update.write() = Some((Instant::now(), Utc::now()));
        self.shared.message_count.fetch_add(1, Ordering::Relaxed);

        debug!(price, "Reference price update");
        let _ = self.events.send(StreamEvent::price(price, &self.config.symbol));
    }
}
