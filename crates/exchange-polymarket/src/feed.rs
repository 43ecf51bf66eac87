//! Real-time order-book feed over the CLOB WebSocket.
//!
//! Subscribes to a set of contract tokens and maintains the best bid/ask per
//! token. Accepts the three message shapes the venue emits (snapshot, update,
//! raw book) with levels in either `{price, size}` or `[price, size]` form.

use crate::types::BookTop;
use btc_arb_core::events::StreamEvent;
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};

/// Configuration for the book feed.
#[derive(Debug, Clone)]
pub struct PolymarketBookFeedConfig {
    /// CLOB market WebSocket URL.
    pub ws_url: String,
    /// Token ids to subscribe to.
    pub token_ids: Vec<String>,
    /// Backoff cap for reconnects.
    pub max_reconnect_delay: Duration,
}

impl Default for PolymarketBookFeedConfig {
    fn default() -> Self {
        Self {
            ws_url: "wss://ws-subscriptions-clob.polymarket.com/ws/market".to_string(),
            token_ids: Vec::new(),
            max_reconnect_delay: Duration::from_secs(60),
        }
    }
}

/// Feed status for the operator surface. No secrets.
#[derive(Debug, Clone, Serialize)]
pub struct PolymarketBookFeedStatus {
    pub connected: bool,
    pub subscribed_tokens: usize,
    pub books_cached: usize,
    pub last_update: Option<DateTime<Utc>>,
    /// Seconds since the latest book change; `None` if never updated.
    pub age_seconds: Option<f64>,
    pub message_count: u64,
    pub error_count: u64,
}

#[derive(Debug)]
struct FeedShared {
    books: RwLock<HashMap<String, BookTop>>,
    last_update: RwLock<Option<(Instant, DateTime<Utc>)>>,
    connected: AtomicBool,
    message_count: AtomicU64,
    error_count: AtomicU64,
}

impl FeedShared {
    fn new() -> Self {
        Self {
            books: RwLock::new(HashMap::new()),
            last_update: RwLock::new(None),
            connected: AtomicBool::new(false),
            message_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
        }
    }
}

/// Cheap cloneable view of the feed state.
#[derive(Debug, Clone)]
pub struct PolymarketBookFeedHandle {
    shared: Arc<FeedShared>,
    subscribed: usize,
}

impl PolymarketBookFeedHandle {
    /// Latest book top for a token.
    #[must_use]
    pub fn book(&self, token_id: &str) -> Option<BookTop> {
        self.shared.books.read().get(token_id).copied()
    }

    /// Best bid for a token.
    #[must_use]
    pub fn best_bid(&self, token_id: &str) -> Option<f64> {
        self.book(token_id).and_then(|b| b.best_bid)
    }

    /// Best ask for a token.
    #[must_use]
    pub fn best_ask(&self, token_id: &str) -> Option<f64> {
        self.book(token_id).and_then(|b| b.best_ask)
    }

    /// Age of the latest book change; `None` if never updated.
    #[must_use]
    pub fn age(&self) -> Option<Duration> {
        self.shared
            .last_update
            .read()
            .map(|(instant, _)| instant.elapsed())
    }

    /// Full status block.
    #[must_use]
    pub fn status(&self) -> PolymarketBookFeedStatus {
        let last = *self.shared.last_update.read();
        PolymarketBookFeedStatus {
            connected: self.shared.connected.load(Ordering::SeqCst),
            subscribed_tokens: self.subscribed,
            books_cached: self.shared.books.read().len(),
            last_update: last.map(|(_, at)| at),
            age_seconds: last.map(|(instant, _)| instant.elapsed().as_secs_f64()),
            message_count: self.shared.message_count.load(Ordering::Relaxed),
            error_count: self.shared.error_count.load(Ordering::Relaxed),
        }
    }
}

/// Persistent order-book push feed.
pub struct PolymarketBookFeed {
    config: PolymarketBookFeedConfig,
    shared: Arc<FeedShared>,
    events: UnboundedSender<StreamEvent>,
    should_stop: Arc<AtomicBool>,
}

impl PolymarketBookFeed {
    /// Creates a feed that reports book changes into the given event channel.
    #[must_use]
    pub fn new(config: PolymarketBookFeedConfig, events: UnboundedSender<StreamEvent>) -> Self {
        Self {
            config,
            shared: Arc::new(FeedShared::new()),
            events,
            should_stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns a shared view of the feed state.
    #[must_use]
    pub fn handle(&self) -> PolymarketBookFeedHandle {
        PolymarketBookFeedHandle {
            shared: self.shared.clone(),
            subscribed: self.config.token_ids.len(),
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
        info!(
            url = %self.config.ws_url,
            tokens = self.config.token_ids.len(),
            "Starting Polymarket book feed"
        );

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
                        "Polymarket feed disconnected, reconnecting in {:?}",
                        reconnect_delay
                    );
                    tokio::time::sleep(reconnect_delay).await;
                    reconnect_delay =
                        (reconnect_delay * 2).min(self.config.max_reconnect_delay);
                }
            }
        }

        self.shared.connected.store(false, Ordering::SeqCst);
        info!("Polymarket book feed stopped");
    }

    async fn connect_and_stream(
        &self,
        reconnect_delay: &mut Duration,
    ) -> Result<(), tokio_tungstenite::tungstenite::Error> {
        let (ws, _) = tokio_tungstenite::connect_async(&self.config.ws_url).await?;
        self.shared.connected.store(true, Ordering::SeqCst);
        *reconnect_delay = Duration::from_secs(1);
        info!("Polymarket feed connected");

        let (mut write, mut read) = ws.split();

        for token_id in &self.config.token_ids {
            let subscribe = json!({
                "type": "subscribe",
                "channel": "book",
                "market": token_id,
            });
            write.send(Message::Text(subscribe.to_string())).await?;
        }

        while let Some(msg) = read.next().await {
            if self.should_stop.load(Ordering::SeqCst) {
                return Ok(());
            }

            match msg {
                Ok(Message::Text(text)) => self.process_message(&text),
                Ok(Message::Close(_)) => {
                    warn!("Polymarket feed socket closed by peer");
                    return Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed);
                }
                Ok(_) => {}
                Err(e) => return Err(e),
            }
        }

        Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed)
    }

    /// Parses one book message and updates shared state.
    ///
    /// Protocol errors are dropped after counting; they never abort the feed.
    fn process_message(&self, raw: &str) {
        let value: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                self.shared.error_count.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Bad Polymarket book message");
                return;
            }
        };

        let msg_type = value.get("type").and_then(Value::as_str).unwrap_or("");
        if !matches!(msg_type, "book_snapshot" | "book_update" | "book") {
            return;
        }

        let Some(token_id) = value
            .get("market")
            .or_else(|| value.get("asset_id"))
            .and_then(Value::as_str)
        else {
            return;
        };

        let top = BookTop {
            best_bid: best_level(value.get("bids")),
            best_ask: best_level(value.get("asks")),
            last_update: Utc::now(),
        };

        self.shared
            .books
            .write()
            .insert(token_id.to_string(), top);
        *self.shared.last_update.write() = Some((Instant::now(), Utc::now()));
        self.shared.message_count.fetch_add(1, Ordering::Relaxed);

        let _ = self
            .events
            .send(StreamEvent::book_update(token_id, top.best_bid, top.best_ask));
    }
}

/// Extracts the first level's price from a bids/asks array.
///
/// Levels arrive sorted best-first; elements may be `{price, size}` objects,
/// `[price, size]` lists, or bare price scalars.
fn best_level(levels: Option<&Value>) -> Option<f64> {
    let first = levels?.as_array()?.first()?;

    let price = match first {
        Value::Object(map) => map.get("price")?,
        Value::Array(pair) => pair.first()?,
        other => other,
    };

    match price {
        Value::String(s) => s.parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn make_feed(tokens: Vec<String>) -> (PolymarketBookFeed, mpsc::UnboundedReceiver<StreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = PolymarketBookFeedConfig {
            token_ids: tokens,
            ..Default::default()
        };
        (PolymarketBookFeed::new(config, tx), rx)
    }

    // ==================== Level Extraction Tests ====================

    #[test]
    fn test_best_level_object_form() {
        let levels = json!([{ "price": "0.48", "size": "100" }]);
        assert_eq!(best_level(Some(&levels)), Some(0.48));
    }

    #[test]
    fn test_best_level_list_form() {
        let levels = json!([[0.52, 250]]);
        assert_eq!(best_level(Some(&levels)), Some(0.52));
    }

    #[test]
    fn test_best_level_scalar_form() {
        let levels = json!(["0.31", "0.32"]);
        assert_eq!(best_level(Some(&levels)), Some(0.31));
    }

    #[test]
    fn test_best_level_empty_or_missing() {
        assert_eq!(best_level(Some(&json!([]))), None);
        assert_eq!(best_level(None), None);
        assert_eq!(best_level(Some(&json!("not an array"))), None);
    }

    // ==================== Message Processing Tests ====================

    #[test]
    fn test_snapshot_message_updates_book() {
        let (feed, mut rx) = make_feed(vec!["tok-1".to_string()]);
        let handle = feed.handle();

        feed.process_message(
            r#"{"type":"book_snapshot","market":"tok-1","bids":[{"price":"0.48","size":"10"}],"asks":[{"price":"0.52","size":"5"}]}"#,
        );

        assert_eq!(handle.best_bid("tok-1"), Some(0.48));
        assert_eq!(handle.best_ask("tok-1"), Some(0.52));
        assert_eq!(handle.status().books_cached, 1);
        assert_eq!(rx.try_recv().unwrap().event_type, "book_update");
    }

    #[test]
    fn test_update_message_by_asset_id() {
        let (feed, _rx) = make_feed(vec![]);
        let handle = feed.handle();

        feed.process_message(r#"{"type":"book_update","asset_id":"tok-2","asks":[[0.6,100]]}"#);

        assert_eq!(handle.best_ask("tok-2"), Some(0.6));
        assert_eq!(handle.best_bid("tok-2"), None);
    }

    #[test]
    fn test_unknown_message_type_ignored() {
        let (feed, mut rx) = make_feed(vec![]);
        let handle = feed.handle();

        feed.process_message(r#"{"type":"trade","market":"tok-3","price":"0.5"}"#);

        assert!(handle.book("tok-3").is_none());
        assert_eq!(handle.status().message_count, 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_malformed_message_counts_error() {
        let (feed, _rx) = make_feed(vec![]);
        feed.process_message("{{{");
        assert_eq!(feed.handle().status().error_count, 1);
    }

    #[test]
    fn test_status_reports_subscription_count() {
        let (feed, _rx) = make_feed(vec!["a".to_string(), "b".to_string()]);
        let status = feed.handle().status();

        assert_eq!(status.subscribed_tokens, 2);
        assert!(!status.connected);
        assert!(status.age_seconds.is_none());
    }

    #[tokio::test]
    async fn test_run_exits_when_stopped_immediately() {
        let (feed, _rx) = make_feed(vec![]);
        feed.stop_handle().store(true, Ordering::SeqCst);
        feed.run().await;
    }
}
