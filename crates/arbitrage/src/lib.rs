//! Fee-aware arbitrage detection over the two contract universes.
//!
//! A pair of contracts whose combined cost is below the shared $1.00 payout
//! (after worst-case fees) locks in the spread. The [`detector`] scans the
//! Kalshi strike ladder around Polymarket's implicit strike and evaluates one
//! or two strategy pairs per strike through the [`fees`] engine.

pub mod detector;
pub mod fees;
pub mod types;

pub use detector::ArbitrageDetector;
pub use fees::{FeeEngine, FeeParams};
pub use types::{ArbitrageCheck, StrikeRelation};
