//! The fan-out hub.

use btc_arb_core::events::StreamEvent;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Capacity of each subscriber queue.
pub const SUBSCRIBER_QUEUE_SIZE: usize = 100;

/// Hub status for the operator surface.
#[derive(Debug, Clone, Serialize)]
pub struct HubStatus {
    pub running: bool,
    pub subscribers: usize,
    pub total_events: u64,
}

struct Shared {
    subscribers: Mutex<Vec<(u64, mpsc::Sender<StreamEvent>)>>,
    next_subscriber_id: AtomicU64,
    event_count: AtomicU64,
    running: AtomicBool,
}

impl Shared {
    fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_subscriber_id: AtomicU64::new(1),
            event_count: AtomicU64::new(0),
            running: AtomicBool::new(false),
        }
    }

    fn unsubscribe(&self, id: u64) {
        let mut subscribers = self.subscribers.lock();
        if let Some(index) = subscribers.iter().position(|(sid, _)| *sid == id) {
            subscribers.swap_remove(index);
            info!(remaining = subscribers.len(), "Stream subscriber removed");
        }
    }

    /// Non-blocking delivery. A full queue marks the subscriber dead.
    fn emit(&self, event: &StreamEvent) {
        self.event_count.fetch_add(1, Ordering::Relaxed);

        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|(id, tx)| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(subscriber = id, "Subscriber queue full, evicting");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }
}

/// A live subscription to the hub's event stream.
///
/// Dropping the subscription unsubscribes its queue.
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<StreamEvent>,
    shared: Arc<Shared>,
}

impl Subscription {
    /// Receives the next event; `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }

    /// Non-blocking receive, for polling consumers and tests.
    pub fn try_recv(&mut self) -> Option<StreamEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shared.unsubscribe(self.id);
    }
}

/// Fans feed events out to subscribers and owns the feed tasks.
pub struct StreamHub {
    shared: Arc<Shared>,
    events_tx: mpsc::UnboundedSender<StreamEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<StreamEvent>>>,
    stop_flags: Mutex<Vec<Arc<AtomicBool>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl StreamHub {
    /// Creates a hub with an open intake channel.
    #[must_use]
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            shared: Arc::new(Shared::new()),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            stop_flags: Mutex::new(Vec::new()),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// The intake channel feeds write into.
    #[must_use]
    pub fn event_sender(&self) -> mpsc::UnboundedSender<StreamEvent> {
        self.events_tx.clone()
    }

    /// Registers a feed task and its cooperative stop flag.
    ///
    /// The hub stops all registered feeds jointly in [`StreamHub::stop`].
    pub fn own_feed(&self, task: JoinHandle<()>, stop: Arc<AtomicBool>) {
        self.stop_flags.lock().push(stop);
        self.tasks.lock().push(task);
    }

    /// Creates a new subscriber with a bounded queue.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        let id = self.shared.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_SIZE);

        let mut subscribers = self.shared.subscribers.lock();
        subscribers.push((id, tx));
        info!(total = subscribers.len(), "New stream subscriber");
        drop(subscribers);

        Subscription {
            id,
            rx,
            shared: self.shared.clone(),
        }
    }

    /// Emits one event directly (components that are not feeds use this).
    pub fn emit(&self, event: StreamEvent) {
        self.shared.emit(&event);
    }

    /// Spawns the fan-out task over the intake channel.
    ///
    /// Call once; later calls are no-ops.
    pub fn start(&self) {
        let Some(mut rx) = self.events_rx.lock().take() else {
            return;
        };

        self.shared.running.store(true, Ordering::SeqCst);
        let shared = self.shared.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                shared.emit(&event);
            }
            shared.running.store(false, Ordering::SeqCst);
        });
        self.tasks.lock().push(task);
        info!("Stream hub started");
    }

    /// Stops all owned feeds and the fan-out task.
    pub async fn stop(&self) {
        for flag in self.stop_flags.lock().iter() {
            flag.store(true, Ordering::SeqCst);
        }

        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            task.abort();
            let _ = task.await;
        }

        self.shared.running.store(false, Ordering::SeqCst);
        info!("Stream hub stopped");
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.lock().len()
    }

    /// Process-wide event counter.
    #[must_use]
    pub fn total_events(&self) -> u64 {
        self.shared.event_count.load(Ordering::Relaxed)
    }

    /// Hub status block.
    #[must_use]
    pub fn status(&self) -> HubStatus {
        HubStatus {
            running: self.shared.running.load(Ordering::SeqCst),
            subscribers: self.subscriber_count(),
            total_events: self.total_events(),
        }
    }
}

impl Default for StreamHub {
    fn default() -> Self {
        Self::new()
    }
}
