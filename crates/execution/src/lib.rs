//! Execution layer: dual-leg order engine, position ledger, latency tracking.
//!
//! The [`engine`] drives a fixed five-step pipeline (preflight → dry-run gate
//! → leg 1 → leg 2 → record, with unwind on a leg-2 failure) and guarantees
//! at-most-one-leg exposure after any failure. The [`positions`] ledger is
//! the in-memory truth for open positions and their arbitrage pairings; the
//! [`latency`] tracker samples per-trade timelines.

pub mod engine;
pub mod latency;
pub mod positions;

pub use engine::{
    EngineConfig, EngineStatus, ExecutionResult, ExecutionStatus, KalshiTrading, OrderEngine,
    PolymarketTrading,
};
pub use latency::{LatencyMeasurement, LatencyPercentiles, LatencyTracker};
pub use positions::{ArbStatus, ArbitragePair, Position, PositionSide, PositionTracker, Venue};
