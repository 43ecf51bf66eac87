//! Circuit breaker: automatic trading halt on anomalies.
//!
//! States: `Closed` (normal) → `Open` (halted, cooldown running) →
//! `HalfOpen` (one probe trade allowed) → `Closed`. The `Open → HalfOpen`
//! transition happens on demand when the state is read after the cooldown,
//! so no timer task is needed.
//!
//! Triggers that open the circuit: consecutive failures, error rate over a
//! sliding window, data staleness, daily loss breach, and explicit trips.

use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation, trades allowed.
    Closed,
    /// Halted, waiting out the cooldown.
    Open,
    /// Cooldown elapsed, one probe trade allowed.
    HalfOpen,
}

impl CircuitState {
    /// Returns the display string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Breaker thresholds.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit.
    pub max_consecutive_failures: u32,
    /// Error rate that opens the circuit once the window has enough samples.
    pub error_rate_threshold: f64,
    /// Sliding window for the error rate.
    pub error_rate_window: Duration,
    /// Minimum samples before the error rate can trip.
    pub error_rate_min_samples: usize,
    /// Time in `Open` before a probe is allowed.
    pub cooldown: Duration,
    /// Maximum data age before the staleness probe trips.
    pub staleness_threshold: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 3,
            error_rate_threshold: 0.5,
            error_rate_window: Duration::from_secs(300),
            error_rate_min_samples: 5,
            cooldown: Duration::from_secs(300),
            staleness_threshold: Duration::from_secs(30),
        }
    }
}

impl BreakerConfig {
    /// Builder method to set the consecutive-failure threshold.
    #[must_use]
    pub fn with_max_consecutive_failures(mut self, failures: u32) -> Self {
        self.max_consecutive_failures = failures;
        self
    }

    /// Builder method to set the cooldown.
    #[must_use]
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Builder method to set the staleness threshold.
    #[must_use]
    pub fn with_staleness_threshold(mut self, threshold: Duration) -> Self {
        self.staleness_threshold = threshold;
        self
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    last_transition: Instant,
    trip_reason: String,
    /// `(when, success)` samples inside the sliding window.
    calls: VecDeque<(Instant, bool)>,
    last_data_update: Instant,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_transition: Instant::now(),
            trip_reason: String::new(),
            calls: VecDeque::new(),
            last_data_update: Instant::now(),
        }
    }

    fn clean_old_calls(&mut self, window: Duration) {
        while self.calls.front().is_some_and(|(t, _)| t.elapsed() > window) {
            self.calls.pop_front();
        }
    }

    fn error_rate(&mut self, window: Duration) -> f64 {
        self.clean_old_calls(window);
        if self.calls.is_empty() {
            return 0.0;
        }
        let failures = self.calls.iter().filter(|(_, ok)| !ok).count();
        failures as f64 / self.calls.len() as f64
    }

    fn transition_to(&mut self, new_state: CircuitState, reason: &str) {
        let old_state = self.state;
        self.state = new_state;
        self.last_transition = Instant::now();

        match new_state {
            CircuitState::Open => {
                error!(from = %old_state, reason, "Circuit breaker OPENED");
            }
            CircuitState::HalfOpen => {
                warn!(from = %old_state, reason, "Circuit breaker HALF-OPEN");
            }
            CircuitState::Closed => {
                info!(from = %old_state, reason, "Circuit breaker CLOSED");
            }
        }
    }
}

/// Status block for the operator surface. Safe to expose.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerStatus {
    pub state: CircuitState,
    pub is_trading_allowed: bool,
    pub consecutive_failures: u32,
    pub max_consecutive_failures: u32,
    pub error_rate: f64,
    pub error_rate_threshold: f64,
    /// Last trip reason; absent while `Closed`.
    pub trip_reason: Option<String>,
    pub time_in_state_secs: f64,
    pub cooldown_secs: u64,
    pub data_age_secs: f64,
}

/// Circuit breaker over failure streams and data freshness.
pub struct CircuitBreaker {
    config: BreakerConfig,
    state: Mutex<BreakerState>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &state.state)
            .field("consecutive_failures", &state.consecutive_failures)
            .finish()
    }
}

impl CircuitBreaker {
    /// Creates a breaker with the given configuration.
    #[must_use]
    pub fn new(config: BreakerConfig) -> Self {
        info!(
            max_failures = config.max_consecutive_failures,
            error_rate = config.error_rate_threshold,
            cooldown = ?config.cooldown,
            staleness = ?config.staleness_threshold,
            "CircuitBreaker initialized"
        );
        Self {
            config,
            state: Mutex::new(BreakerState::new()),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Current state, applying the on-demand `Open → HalfOpen` transition
    /// when the cooldown has elapsed.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        let mut state = self.state.lock();
        self.maybe_half_open(&mut state);
        state.state
    }

    /// Whether trading is currently permitted.
    #[must_use]
    pub fn is_trading_allowed(&self) -> bool {
        matches!(self.state(), CircuitState::Closed | CircuitState::HalfOpen)
    }

    /// Records a successful trade or API call.
    ///
    /// A success in `HalfOpen` resolves the probe and closes the circuit.
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        state.calls.push_back((Instant::now(), true));
        state.clean_old_calls(self.config.error_rate_window);

        if state.state == CircuitState::HalfOpen {
            state.transition_to(CircuitState::Closed, "half-open probe succeeded");
        }
        state.consecutive_failures = 0;
    }

    /// Records a failed trade or API call.
    ///
    /// A failure in `HalfOpen` re-opens immediately, before the consecutive
    /// count is reached.
    pub fn record_failure(&self, reason: &str) {
        let mut state = self.state.lock();
        state.calls.push_back((Instant::now(), false));
        state.consecutive_failures += 1;

        warn!(
            failures = state.consecutive_failures,
            max = self.config.max_consecutive_failures,
            reason,
            "Circuit breaker failure recorded"
        );

        if state.state == CircuitState::HalfOpen {
            let trip_reason = format!("half-open probe failed: {reason}");
            Self::trip_locked(&mut state, &trip_reason);
            return;
        }

        if state.consecutive_failures >= self.config.max_consecutive_failures {
            let trip_reason = format!(
                "{} consecutive failures: {reason}",
                state.consecutive_failures
            );
            Self::trip_locked(&mut state, &trip_reason);
            return;
        }

        let rate = state.error_rate(self.config.error_rate_window);
        if rate > self.config.error_rate_threshold
            && state.calls.len() >= self.config.error_rate_min_samples
        {
            let trip_reason = format!(
                "error rate {:.0}% > {:.0}%",
                rate * 100.0,
                self.config.error_rate_threshold * 100.0
            );
            Self::trip_locked(&mut state, &trip_reason);
        }
    }

    /// Marks that fresh market data was received.
    pub fn record_data_update(&self) {
        self.state.lock().last_data_update = Instant::now();
    }

    /// Checks data freshness, tripping on staleness.
    ///
    /// Returns true if data is fresh, false if the breaker tripped.
    pub fn check_data_staleness(&self) -> bool {
        let mut state = self.state.lock();
        let age = state.last_data_update.elapsed();

        if age > self.config.staleness_threshold {
            let reason = format!(
                "data stale for {}s (threshold {}s)",
                age.as_secs(),
                self.config.staleness_threshold.as_secs()
            );
            Self::trip_locked(&mut state, &reason);
            return false;
        }
        true
    }

    /// Checks the daily loss against the limit, tripping on breach.
    ///
    /// Returns true if within limits, false if the breaker tripped.
    pub fn check_daily_loss(&self, daily_pnl: Decimal, max_loss: Decimal) -> bool {
        if daily_pnl <= -max_loss {
            let mut state = self.state.lock();
            let reason = format!("daily loss ${} >= max ${max_loss}", -daily_pnl);
            Self::trip_locked(&mut state, &reason);
            return false;
        }
        true
    }

    /// Immediately opens the circuit.
    pub fn trip(&self, reason: &str) {
        let mut state = self.state.lock();
        Self::trip_locked(&mut state, reason);
    }

    /// Manually resets the circuit to `Closed`.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.transition_to(CircuitState::Closed, "manual reset");
        state.consecutive_failures = 0;
        state.trip_reason.clear();
    }

    /// Full status block.
    #[must_use]
    pub fn status(&self) -> BreakerStatus {
        let mut state = self.state.lock();
        self.maybe_half_open(&mut state);

        let current = state.state;
        let error_rate = state.error_rate(self.config.error_rate_window);

        BreakerStatus {
            state: current,
            is_trading_allowed: matches!(
                current,
                CircuitState::Closed | CircuitState::HalfOpen
            ),
            consecutive_failures: state.consecutive_failures,
            max_consecutive_failures: self.config.max_consecutive_failures,
            error_rate,
            error_rate_threshold: self.config.error_rate_threshold,
            trip_reason: (current != CircuitState::Closed)
                .then(|| state.trip_reason.clone()),
            time_in_state_secs: state.last_transition.elapsed().as_secs_f64(),
            cooldown_secs: self.config.cooldown.as_secs(),
            data_age_secs: state.last_data_update.elapsed().as_secs_f64(),
        }
    }

    fn maybe_half_open(&self, state: &mut BreakerState) {
        if state.state == CircuitState::Open
            && state.last_transition.elapsed() >= self.config.cooldown
        {
            state.transition_to(CircuitState::HalfOpen, "cooldown elapsed");
        }
    }

    /// Consecutive count resets on trip so the circuit does not re-trip the
    /// instant it half-opens.
    fn trip_locked(state: &mut BreakerState, reason: &str) {
        state.trip_reason = reason.to_string();
        state.transition_to(CircuitState::Open, reason);
        state.consecutive_failures = 0;
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::thread;

    fn fast_breaker(cooldown_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            BreakerConfig::default().with_cooldown(Duration::from_millis(cooldown_ms)),
        )
    }

    // ==================== Basic State Tests ====================

    #[test]
    fn test_starts_closed_and_allowed() {
        let breaker = CircuitBreaker::default();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.is_trading_allowed());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(CircuitState::Closed.as_str(), "closed");
        assert_eq!(CircuitState::HalfOpen.as_str(), "half_open");
        assert_eq!(
            serde_json::to_string(&CircuitState::HalfOpen).unwrap(),
            "\"half_open\""
        );
    }

    // ==================== Consecutive Failure Tests ====================

    #[test]
    fn test_breaker_monotone_in_consecutive_failures() {
        let breaker = CircuitBreaker::default();

        breaker.record_failure("err");
        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.record_failure("err");
        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.record_failure("err");
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.is_trading_allowed());
    }

    #[test]
    fn test_success_resets_consecutive_count() {
        let breaker = CircuitBreaker::default();

        breaker.record_failure("err");
        breaker.record_failure("err");
        breaker.record_success();
        breaker.record_failure("err");
        breaker.record_failure("err");

        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    // ==================== Cooldown / HalfOpen Tests ====================

    #[test]
    fn test_open_transitions_to_half_open_on_read_after_cooldown() {
        let breaker = fast_breaker(20);
        breaker.trip("test");
        assert_eq!(breaker.state(), CircuitState::Open);

        thread::sleep(Duration::from_millis(30));

        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(breaker.is_trading_allowed());
    }

    #[test]
    fn test_half_open_success_closes() {
        let breaker = fast_breaker(10);
        breaker.trip("test");
        thread::sleep(Duration::from_millis(20));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_failure_reopens_immediately() {
        let breaker = fast_breaker(10);
        breaker.trip("test");
        thread::sleep(Duration::from_millis(20));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        // A single failure re-opens, well below the consecutive threshold.
        breaker.record_failure("probe failed");
        assert_eq!(breaker.state(), CircuitState::Open);
        let status = breaker.status();
        assert!(status.trip_reason.unwrap().contains("half-open"));
    }

    #[test]
    fn test_trip_then_recover_cycle() {
        let breaker = fast_breaker(10);

        breaker.record_failure("a");
        breaker.record_failure("b");
        breaker.record_failure("c");
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.is_trading_allowed());

        thread::sleep(Duration::from_millis(20));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(breaker.is_trading_allowed());

        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    // ==================== Error Rate Tests ====================

    #[test]
    fn test_error_rate_needs_minimum_samples() {
        let breaker = CircuitBreaker::new(
            BreakerConfig::default().with_max_consecutive_failures(100),
        );

        // 3 failures, 1 success: 75% rate but only 4 samples.
        breaker.record_failure("a");
        breaker.record_success();
        breaker.record_failure("b");
        breaker.record_failure("c");
        assert_eq!(breaker.state(), CircuitState::Closed);

        // Fifth sample pushes over the minimum with rate > 50%.
        breaker.record_failure("d");
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(breaker.status().trip_reason.unwrap().contains("error rate"));
    }

    #[test]
    fn test_balanced_rate_does_not_trip() {
        let breaker = CircuitBreaker::new(
            BreakerConfig::default().with_max_consecutive_failures(100),
        );

        for _ in 0..5 {
            breaker.record_failure("x");
            breaker.record_success();
        }

        // Rate is exactly 0.5, not above the threshold.
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    // ==================== Staleness Tests ====================

    #[test]
    fn test_fresh_data_passes_staleness_check() {
        let breaker = CircuitBreaker::default();
        breaker.record_data_update();
        assert!(breaker.check_data_staleness());
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_stale_data_trips() {
        let breaker = CircuitBreaker::new(
            BreakerConfig::default().with_staleness_threshold(Duration::from_millis(10)),
        );

        thread::sleep(Duration::from_millis(25));

        assert!(!breaker.check_data_staleness());
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(breaker.status().trip_reason.unwrap().contains("stale"));
    }

    // ==================== Daily Loss Tests ====================

    #[test]
    fn test_daily_loss_within_limit() {
        let breaker = CircuitBreaker::default();
        assert!(breaker.check_daily_loss(dec!(-99.99), dec!(100)));
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_daily_loss_breach_trips() {
        let breaker = CircuitBreaker::default();
        assert!(!breaker.check_daily_loss(dec!(-100), dec!(100)));
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    // ==================== Reset Tests ====================

    #[test]
    fn test_manual_reset() {
        let breaker = CircuitBreaker::default();
        breaker.trip("operator stop");
        assert!(!breaker.is_trading_allowed());

        breaker.reset();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.status().trip_reason.is_none());
    }

    // ==================== Status Tests ====================

    #[test]
    fn test_status_while_closed() {
        let breaker = CircuitBreaker::default();
        let status = breaker.status();

        assert_eq!(status.state, CircuitState::Closed);
        assert!(status.is_trading_allowed);
        assert!(status.trip_reason.is_none());
        assert_eq!(status.cooldown_secs, 300);
        assert!(status.error_rate.abs() < f64::EPSILON);
    }

    #[test]
    fn test_status_while_open_carries_reason() {
        let breaker = CircuitBreaker::default();
        breaker.trip("manual kill");

        let status = breaker.status();
        assert_eq!(status.state, CircuitState::Open);
        assert!(!status.is_trading_allowed);
        assert_eq!(status.trip_reason.as_deref(), Some("manual kill"));
    }

    // ==================== Thread Safety Tests ====================

    #[test]
    fn test_concurrent_recording() {
        use std::sync::Arc;

        let breaker = Arc::new(CircuitBreaker::new(
            BreakerConfig::default().with_max_consecutive_failures(1000),
        ));
        let mut handles = vec![];

        for i in 0..10 {
            let b = Arc::clone(&breaker);
            handles.push(thread::spawn(move || {
                if i % 2 == 0 {
                    b.record_success();
                } else {
                    b.record_failure("concurrent");
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // All ten samples landed in the window.
        let status = breaker.status();
        assert!((status.error_rate - 0.5).abs() < 1e-9);
    }
}
