//! Binance integration for the arbitrage trader.
//!
//! Binance is the reference exchange: its hourly open price is the strike the
//! Polymarket contract settles against, and its live ticker drives freshness
//! accounting. Two components:
//!
//! - [`BinanceClient`]: REST client for the current price and the hourly open.
//! - [`BinanceFeed`]: persistent WebSocket ticker stream with reconnect.

pub mod client;
pub mod error;
pub mod feed;

pub use client::{BinanceClient, BinanceClientConfig};
pub use error::BinanceError;
pub use feed::{BinanceFeed, BinanceFeedConfig, BinanceFeedHandle};
