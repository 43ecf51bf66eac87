//! Stream hub: single-writer-per-feed, many-reader fan-out.
//!
//! Feeds produce [`StreamEvent`]s into the hub's intake channel; the hub's
//! fan-out task forwards each event to every subscriber over a bounded queue.
//! A subscriber whose queue is full is treated as dead and evicted. The hub
//! also owns the feed tasks and stops them jointly.

pub mod hub;

pub use hub::{HubStatus, StreamHub, Subscription, SUBSCRIBER_QUEUE_SIZE};
