//! Persistent storage for the arbitrage trader.
//!
//! A single SQLite file in WAL mode holds append-only tables for trades,
//! positions, opportunities, and bot events, plus a versioned schema table.
//! All writes are parameterised; no credentials or signing material are ever
//! stored. Position truth between commits is the in-memory ledger; this
//! store is the write-through record.

pub mod store;

pub use store::{Store, StoreStats, TradeRecord};
