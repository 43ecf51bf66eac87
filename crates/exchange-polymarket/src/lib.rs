//! Polymarket CLOB integration.
//!
//! Polymarket lists one hourly "Bitcoin up or down" market whose implicit
//! strike is the reference exchange's hourly open. This crate provides:
//!
//! - [`types`]: the normalized snapshot and side types.
//! - [`orderbook`]: the depth model with budget-bounded fill walking.
//! - [`client`]: Gamma event lookup plus CLOB order-book retrieval.
//! - [`trading`]: CLOB order client (FOK default) with L2 header auth and a
//!   dry-run path that never touches the network.
//! - [`feed`]: the order-book push feed over the CLOB WebSocket.

pub mod client;
pub mod error;
pub mod feed;
pub mod orderbook;
pub mod trading;
pub mod types;

pub use client::{PolymarketDataClient, PolymarketDataClientConfig};
pub use error::PolymarketError;
pub use feed::{PolymarketBookFeed, PolymarketBookFeedConfig, PolymarketBookFeedHandle};
pub use orderbook::{OrderBook, OrderBookLevel};
pub use trading::{
    PolyOrderIntent, PolyOrderType, PolymarketOrderResponse, PolymarketTradeClient,
    PolymarketTradeClientConfig,
};
pub use types::{BookTop, PolySide, PolymarketSnapshot, Side};
