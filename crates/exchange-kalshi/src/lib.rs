//! Kalshi exchange integration.
//!
//! Kalshi lists one hourly Bitcoin event with a ladder of strikes, each a
//! binary contract quoted in integer cents. This crate provides:
//!
//! - [`types`]: the market universe model and subtitle strike parsing.
//! - [`client`]: public market-data client (no auth required).
//! - [`auth`]: RSA-PSS request signing for the trade API.
//! - [`trading`]: authenticated order placement, cancellation, and account
//!   queries, with a dry-run path that never touches the network.
//! - [`feed`]: the REST polling feed (Kalshi has no public market-data push).

pub mod auth;
pub mod client;
pub mod error;
pub mod feed;
pub mod trading;
pub mod types;

pub use auth::{KalshiAuth, SignedHeaders};
pub use client::{KalshiDataClient, KalshiDataClientConfig};
pub use error::KalshiError;
pub use feed::{KalshiPollFeed, KalshiPollFeedConfig, KalshiPollFeedHandle};
pub use trading::{KalshiOrderResponse, KalshiTradeClient, KalshiTradeClientConfig, OrderIntent};
pub use types::{parse_strike, KalshiMarket, KalshiSide, KalshiSnapshot};
