//! Risk manager: the gatekeeper for trade execution.
//!
//! Six gates, all of which must pass, checked in a fixed order. The first
//! failing gate produces a typed rejection whose `Display` is the
//! operator-facing reason. A rejection is an expected outcome, not an error
//! condition.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Trailing window for the trades-per-hour gate.
const RATE_WINDOW: Duration = Duration::from_secs(3600);

/// Trading limits enforced by the gates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLimits {
    pub min_net_margin: Decimal,
    pub max_single_trade_usd: Decimal,
    pub max_total_exposure_usd: Decimal,
    pub max_daily_loss_usd: Decimal,
    pub max_trades_per_hour: u32,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            min_net_margin: Decimal::new(2, 2),
            max_single_trade_usd: Decimal::from(50),
            max_total_exposure_usd: Decimal::from(500),
            max_daily_loss_usd: Decimal::from(100),
            max_trades_per_hour: 20,
        }
    }
}

/// First failing gate, with the numbers that tripped it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RiskRejection {
    /// Gate 1: halted by kill switch or breaker.
    #[error("Trading halted: {reason}")]
    Halted { reason: String },

    /// Gate 2: margin below minimum.
    #[error("Net margin ${net_margin} < min ${min_net_margin}")]
    MarginTooThin {
        net_margin: Decimal,
        min_net_margin: Decimal,
    },

    /// Gate 3: single trade too large.
    #[error("Trade ${cost_usd} > max ${max_single_trade_usd}")]
    TradeTooLarge {
        cost_usd: Decimal,
        max_single_trade_usd: Decimal,
    },

    /// Gate 4: projected exposure exceeds the cap.
    #[error("Exposure ${current_exposure} + ${cost_usd} > max ${max_total_exposure_usd}")]
    ExposureExceeded {
        current_exposure: Decimal,
        cost_usd: Decimal,
        max_total_exposure_usd: Decimal,
    },

    /// Gate 5: daily loss limit breached.
    #[error("Daily loss ${daily_loss} >= max ${max_daily_loss_usd}")]
    DailyLossBreached {
        daily_loss: Decimal,
        max_daily_loss_usd: Decimal,
    },

    /// Gate 6: trades-per-hour rate limit.
    #[error("Rate limit: {trades_this_hour}/{max_trades_per_hour} trades/hr")]
    RateLimited {
        trades_this_hour: u32,
        max_trades_per_hour: u32,
    },
}

#[derive(Debug)]
struct RiskState {
    trade_timestamps: VecDeque<Instant>,
    daily_pnl: Decimal,
    total_exposure: Decimal,
    trades_today: u32,
    halted: bool,
    halt_reason: String,
}

impl RiskState {
    fn new() -> Self {
        Self {
            trade_timestamps: VecDeque::new(),
            daily_pnl: Decimal::ZERO,
            total_exposure: Decimal::ZERO,
            trades_today: 0,
            halted: false,
            halt_reason: String::new(),
        }
    }

    fn clean_old_timestamps(&mut self) {
        while self
            .trade_timestamps
            .front()
            .is_some_and(|t| t.elapsed() > RATE_WINDOW)
        {
            self.trade_timestamps.pop_front();
        }
    }
}

/// Status block for the operator surface. Scalars and limits only.
#[derive(Debug, Clone, Serialize)]
pub struct RiskStatus {
    pub is_halted: bool,
    pub halt_reason: Option<String>,
    pub daily_pnl: Decimal,
    pub total_exposure: Decimal,
    pub trades_today: u32,
    pub trades_this_hour: u32,
    pub limits: RiskLimits,
}

/// Enforces trading limits. Thread-safe; every mutating operation is atomic
/// at the operation level.
pub struct RiskManager {
    limits: RiskLimits,
    state: RwLock<RiskState>,
}

impl std::fmt::Debug for RiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("RiskManager")
            .field("limits", &self.limits)
            .field("halted", &state.halted)
            .field("daily_pnl", &state.daily_pnl)
            .field("total_exposure", &state.total_exposure)
            .finish()
    }
}

impl RiskManager {
    /// Creates a risk manager with the given limits.
    #[must_use]
    pub fn new(limits: RiskLimits) -> Self {
        info!(
            max_trade = %limits.max_single_trade_usd,
            max_exposure = %limits.max_total_exposure_usd,
            max_daily_loss = %limits.max_daily_loss_usd,
            max_trades_per_hour = limits.max_trades_per_hour,
            min_margin = %limits.min_net_margin,
            "RiskManager initialized"
        );
        Self {
            limits,
            state: RwLock::new(RiskState::new()),
        }
    }

    /// Returns the limits.
    #[must_use]
    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Applies all six gates to a trade candidate.
    ///
    /// `current_exposure` is the authoritative figure from the position
    /// tracker; the manager's own running total backs the status surface.
    ///
    /// # Errors
    /// Returns the first failing gate.
    pub fn check_trade(
        &self,
        net_margin: Decimal,
        cost_usd: Decimal,
        current_exposure: Decimal,
    ) -> Result<(), RiskRejection> {
        let mut state = self.state.write();

        if state.halted {
            let rejection = RiskRejection::Halted {
                reason: state.halt_reason.clone(),
            };
            warn!(%rejection, "Risk gate 1 failed");
            return Err(rejection);
        }

        if net_margin < self.limits.min_net_margin {
            let rejection = RiskRejection::MarginTooThin {
                net_margin,
                min_net_margin: self.limits.min_net_margin,
            };
            info!(%rejection, "Risk gate 2 failed");
            return Err(rejection);
        }

        if cost_usd > self.limits.max_single_trade_usd {
            let rejection = RiskRejection::TradeTooLarge {
                cost_usd,
                max_single_trade_usd: self.limits.max_single_trade_usd,
            };
            info!(%rejection, "Risk gate 3 failed");
            return Err(rejection);
        }

        if current_exposure + cost_usd > self.limits.max_total_exposure_usd {
            let rejection = RiskRejection::ExposureExceeded {
                current_exposure,
                cost_usd,
                max_total_exposure_usd: self.limits.max_total_exposure_usd,
            };
            info!(%rejection, "Risk gate 4 failed");
            return Err(rejection);
        }

        if state.daily_pnl <= -self.limits.max_daily_loss_usd {
            let rejection = RiskRejection::DailyLossBreached {
                daily_loss: -state.daily_pnl,
                max_daily_loss_usd: self.limits.max_daily_loss_usd,
            };
            warn!(%rejection, "Risk gate 5 failed");
            return Err(rejection);
        }

        state.clean_old_timestamps();
        let trades_this_hour = state.trade_timestamps.len() as u32;
        if trades_this_hour >= self.limits.max_trades_per_hour {
            let rejection = RiskRejection::RateLimited {
                trades_this_hour,
                max_trades_per_hour: self.limits.max_trades_per_hour,
            };
            warn!(%rejection, "Risk gate 6 failed");
            return Err(rejection);
        }

        debug!(%cost_usd, "All risk gates passed");
        Ok(())
    }

    /// Records a completed trade for rate, PnL, and exposure tracking.
    pub fn record_trade(&self, pnl: Decimal, cost_usd: Decimal) {
        let mut state = self.state.write();
        state.trade_timestamps.push_back(Instant::now());
        state.daily_pnl += pnl;
        state.total_exposure += cost_usd;
        state.trades_today += 1;

        info!(
            %pnl,
            daily_pnl = %state.daily_pnl,
            exposure = %state.total_exposure,
            trades_today = state.trades_today,
            "Trade recorded"
        );
    }

    /// Reduces exposure when a position settles. Floored at zero.
    pub fn close_position(&self, cost_usd: Decimal) {
        let mut state = self.state.write();
        state.total_exposure = (state.total_exposure - cost_usd).max(Decimal::ZERO);
    }

    /// Halts all trading. Called by the circuit breaker or kill switch.
    pub fn halt(&self, reason: impl Into<String>) {
        let reason = reason.into();
        let mut state = self.state.write();
        state.halted = true;
        state.halt_reason.clone_from(&reason);
        warn!(%reason, "Trading halted");
    }

    /// Resumes trading after a halt.
    pub fn resume(&self, reason: &str) {
        let mut state = self.state.write();
        state.halted = false;
        state.halt_reason.clear();
        info!(reason, "Trading resumed");
    }

    /// Whether trading is currently halted.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.state.read().halted
    }

    /// Cumulative PnL since the last daily reset.
    #[must_use]
    pub fn daily_pnl(&self) -> Decimal {
        self.state.read().daily_pnl
    }

    /// Running exposure total.
    #[must_use]
    pub fn total_exposure(&self) -> Decimal {
        self.state.read().total_exposure
    }

    /// Trades recorded in the trailing hour.
    #[must_use]
    pub fn trades_this_hour(&self) -> u32 {
        let mut state = self.state.write();
        state.clean_old_timestamps();
        state.trade_timestamps.len() as u32
    }

    /// Resets daily counters. Called at midnight UTC.
    pub fn reset_daily(&self) {
        let mut state = self.state.write();
        state.daily_pnl = Decimal::ZERO;
        state.trades_today = 0;
        info!("Daily risk counters reset");
    }

    /// Full status block. Never includes credentials.
    #[must_use]
    pub fn status(&self) -> RiskStatus {
        let trades_this_hour = self.trades_this_hour();
        let state = self.state.read();
        RiskStatus {
            is_halted: state.halted,
            halt_reason: state.halted.then(|| state.halt_reason.clone()),
            daily_pnl: state.daily_pnl,
            total_exposure: state.total_exposure,
            trades_today: state.trades_today,
            trades_this_hour,
            limits: self.limits.clone(),
        }
    }
}

impl Default for RiskManager {
    fn default() -> Self {
        Self::new(RiskLimits::default())
    }
}
