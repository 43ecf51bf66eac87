//! Core types for the BTC hourly arbitrage trader.
//!
//! This crate holds the pieces every other crate depends on: the application
//! configuration (loaded from a TOML file plus environment overrides) and the
//! unified stream event type that flows through the fan-out hub.

pub mod config;
pub mod events;

pub use config::{AppConfig, CredentialsConfig, ServerConfig, TradingConfig};
pub use events::{EventSource, StreamEvent};
