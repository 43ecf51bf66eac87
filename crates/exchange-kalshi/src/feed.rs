//! Kalshi market-list polling feed.
//!
//! Kalshi has no public market-data push, so the feed polls the REST markets
//! endpoint on a fixed interval (default 2 s) and emits the raw payload into
//! the stream hub. Exposes the same status surface as the push feeds.

use crate::client::KalshiDataClient;
use btc_arb_core::events::StreamEvent;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

/// Configuration for the polling feed.
#[derive(Debug, Clone)]
pub struct KalshiPollFeedConfig {
    /// Event ticker to poll.
    pub event_ticker: String,
    /// Poll cadence.
    pub poll_interval: Duration,
}

impl Default for KalshiPollFeedConfig {
    fn default() -> Self {
        Self {
            event_ticker: String::new(),
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// Feed status for the operator surface. No secrets.
#[derive(Debug, Clone, Serialize)]
pub struct KalshiPollFeedStatus {
    pub running: bool,
    pub poll_interval_secs: f64,
    pub last_poll: Option<DateTime<Utc>>,
    /// Seconds since the latest successful poll; `None` if never polled.
    pub age_seconds: Option<f64>,
    pub poll_count: u64,
    pub error_count: u64,
    pub has_data: bool,
}

#[derive(Debug)]
struct FeedShared {
    latest: RwLock<Option<Value>>,
    last_poll: RwLock<Option<(Instant, DateTime<Utc>)>>,
    running: AtomicBool,
    poll_count: AtomicU64,
    error_count: AtomicU64,
}

impl FeedShared {
    fn new() -> Self {
        Self {
            latest: RwLock::new(None),
            last_poll: RwLock::new(None),
            running: AtomicBool::new(false),
            poll_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
        }
    }
}

/// Cheap cloneable view of the feed state.
#[derive(Debug, Clone)]
pub struct KalshiPollFeedHandle {
    shared: Arc<FeedShared>,
    poll_interval: Duration,
}

impl KalshiPollFeedHandle {
    /// Latest raw market payload, if any poll has succeeded.
    #[must_use]
    pub fn latest(&self) -> Option<Value> {
        self.shared.latest.read().clone()
    }

    /// Age of the latest successful poll; `None` if never polled.
    #[must_use]
    pub fn age(&self) -> Option<Duration> {
        self.shared
            .last_poll
            .read()
            .map(|(instant, _)| instant.elapsed())
    }

    /// Full status block.
    #[must_use]
    pub fn status(&self) -> KalshiPollFeedStatus {
        let last = *self.shared.last_poll.read();
        KalshiPollFeedStatus {
            running: self.shared.running.load(Ordering::SeqCst),
            poll_interval_secs: self.poll_interval.as_secs_f64(),
            last_poll: last.map(|(_, at)| at),
            age_seconds: last.map(|(instant, _)| instant.elapsed().as_secs_f64()),
            poll_count: self.shared.poll_count.load(Ordering::Relaxed),
            error_count: self.shared.error_count.load(Ordering::Relaxed),
            has_data: self.shared.latest.read().is_some(),
        }
    }
}

/// REST polling feed for the Kalshi strike ladder.
pub struct KalshiPollFeed {
    config: KalshiPollFeedConfig,
    client: KalshiDataClient,
    shared: Arc<FeedShared>,
    events: UnboundedSender<StreamEvent>,
    should_stop: Arc<AtomicBool>,
}

impl KalshiPollFeed {
    /// Creates a polling feed over the given data client.
    #[must_use]
    pub fn new(
        config: KalshiPollFeedConfig,
        client: KalshiDataClient,
        events: UnboundedSender<StreamEvent>,
    ) -> Self {
        Self {
            config,
            client,
            shared: Arc::new(FeedShared::new()),
            events,
            should_stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns a shared view of the feed state.
    #[must_use]
    pub fn handle(&self) -> KalshiPollFeedHandle {
        KalshiPollFeedHandle {
            shared: self.shared.clone(),
            poll_interval: self.config.poll_interval,
        }
    }

    /// Returns the cooperative stop flag.
    #[must_use]
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.should_stop.clone()
    }

    /// Runs the polling loop until the stop flag is set.
    pub async fn run(self) {
        self.shared.running.store(true, Ordering::SeqCst);
        info!(
            event = %self.config.event_ticker,
            interval = ?self.config.poll_interval,
            "Starting Kalshi polling feed"
        );

        loop {
            if self.should_stop.load(Ordering::SeqCst) {
                break;
            }

            self.poll_once().await;
            tokio::time::sleep(self.config.poll_interval).await;
        }

        self.shared.running.store(false, Ordering::SeqCst);
        info!("Kalshi polling feed stopped");
    }

    /// Executes one poll cycle. Errors are counted, logged, and swallowed.
    pub async fn poll_once(&self) {
        match self.client.fetch_raw(&self.config.event_ticker).await {
            Ok(payload) => {
                *self.shared.latest.write() = Some(payload.clone());
                *self.shared.last_poll.write() = Some((Instant::now(), Utc::now()));
                self.shared.poll_count.fetch_add(1, Ordering::Relaxed);
                let _ = self.events.send(StreamEvent::market_data(payload));
            }
            Err(e) => {
                self.shared.error_count.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Kalshi poll failed");
            }
        }
    }
}
