//! Safety stack gating every live action.
//!
//! Three collaborators, each a singleton shared across tasks:
//!
//! - [`RiskManager`]: six ordered gates applied to every trade candidate.
//! - [`CircuitBreaker`]: state machine over failure streams and data
//!   freshness.
//! - [`KillSwitch`]: file-and-API-activated global halt with a constant-time
//!   token check.

pub mod breaker;
pub mod kill_switch;
pub mod risk;

pub use breaker::{BreakerConfig, BreakerStatus, CircuitBreaker, CircuitState};
pub use kill_switch::{validate_token, KillSwitch, KillSwitchStatus};
pub use risk::{RiskLimits, RiskManager, RiskRejection, RiskStatus};
