//! Execution latency tracking.
//!
//! A measurement starts when an opportunity is detected and punches marks as
//! each leg is sent and filled. Completed samples land in a bounded FIFO;
//! percentiles are computed on demand with linear interpolation. Target:
//! P95 under 500 ms from detection to completion.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Instant;
use tracing::{info, warn};

/// Default sample window.
pub const DEFAULT_MAX_HISTORY: usize = 500;

/// Detection-to-completion target in milliseconds.
pub const TARGET_TOTAL_MS: f64 = 500.0;

/// A single latency measurement for one execution cycle.
#[derive(Debug, Clone)]
pub struct LatencyMeasurement {
    pub trade_id: String,
    detected_at: Option<Instant>,
    leg1_sent_at: Option<Instant>,
    leg1_filled_at: Option<Instant>,
    leg2_sent_at: Option<Instant>,
    leg2_filled_at: Option<Instant>,
    completed_at: Option<Instant>,
}

impl LatencyMeasurement {
    /// Creates an empty measurement.
    #[must_use]
    pub fn new(trade_id: impl Into<String>) -> Self {
        Self {
            trade_id: trade_id.into(),
            detected_at: None,
            leg1_sent_at: None,
            leg1_filled_at: None,
            leg2_sent_at: None,
            leg2_filled_at: None,
            completed_at: None,
        }
    }

    pub fn mark_detected(&mut self) {
        self.detected_at = Some(Instant::now());
    }

    pub fn mark_leg1_sent(&mut self) {
        self.leg1_sent_at = Some(Instant::now());
    }

    pub fn mark_leg1_filled(&mut self) {
        self.leg1_filled_at = Some(Instant::now());
    }

    pub fn mark_leg2_sent(&mut self) {
        self.leg2_sent_at = Some(Instant::now());
    }

    pub fn mark_leg2_filled(&mut self) {
        self.leg2_filled_at = Some(Instant::now());
    }

    pub fn mark_completed(&mut self) {
        self.completed_at = Some(Instant::now());
    }

    /// Detection to leg-1 send.
    #[must_use]
    pub fn detection_to_leg1_ms(&self) -> Option<f64> {
        span_ms(self.detected_at, self.leg1_sent_at)
    }

    /// Leg-1 send to fill.
    #[must_use]
    pub fn leg1_fill_ms(&self) -> Option<f64> {
        span_ms(self.leg1_sent_at, self.leg1_filled_at)
    }

    /// Leg-1 send to leg-2 send: the exposure window between fills.
    #[must_use]
    pub fn leg1_to_leg2_ms(&self) -> Option<f64> {
        span_ms(self.leg1_sent_at, self.leg2_sent_at)
    }

    /// Leg-2 send to fill.
    #[must_use]
    pub fn leg2_fill_ms(&self) -> Option<f64> {
        span_ms(self.leg2_sent_at, self.leg2_filled_at)
    }

    /// Detection to completion.
    #[must_use]
    pub fn total_ms(&self) -> Option<f64> {
        span_ms(self.detected_at, self.completed_at)
    }

    /// Serializable view of the spans.
    #[must_use]
    pub fn report(&self) -> LatencyReport {
        LatencyReport {
            trade_id: self.trade_id.clone(),
            detection_to_leg1_ms: self.detection_to_leg1_ms(),
            leg1_fill_ms: self.leg1_fill_ms(),
            leg1_to_leg2_ms: self.leg1_to_leg2_ms(),
            leg2_fill_ms: self.leg2_fill_ms(),
            total_ms: self.total_ms(),
        }
    }
}

fn span_ms(from: Option<Instant>, to: Option<Instant>) -> Option<f64> {
    let (from, to) = (from?, to?);
    Some(to.duration_since(from).as_secs_f64() * 1000.0)
}

/// Serializable span breakdown of one measurement.
#[derive(Debug, Clone, Serialize)]
pub struct LatencyReport {
    pub trade_id: String,
    pub detection_to_leg1_ms: Option<f64>,
    pub leg1_fill_ms: Option<f64>,
    pub leg1_to_leg2_ms: Option<f64>,
    pub leg2_fill_ms: Option<f64>,
    pub total_ms: Option<f64>,
}

/// Rolling percentiles over the sample window.
#[derive(Debug, Clone, Serialize)]
pub struct LatencyPercentiles {
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
    pub count: usize,
    pub min_ms: Option<f64>,
    pub max_ms: Option<f64>,
    pub avg_ms: Option<f64>,
}

/// Full latency status for the operator surface.
#[derive(Debug, Clone, Serialize)]
pub struct LatencyStatus {
    pub total_trades_measured: u64,
    pub percentiles: LatencyPercentiles,
    pub target_ms: f64,
    /// `None` until at least one sample exists.
    pub meets_target: Option<bool>,
}

#[derive(Debug)]
struct TrackerInner {
    history: VecDeque<LatencyMeasurement>,
    total_trades: u64,
}

/// Tracks execution latency across all trades.
#[derive(Debug)]
pub struct LatencyTracker {
    inner: Mutex<TrackerInner>,
    max_history: usize,
}

impl LatencyTracker {
    /// Creates a tracker with the default window.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_history(DEFAULT_MAX_HISTORY)
    }

    /// Creates a tracker holding at most `max_history` samples.
    #[must_use]
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            inner: Mutex::new(TrackerInner {
                history: VecDeque::with_capacity(max_history),
                total_trades: 0,
            }),
            max_history,
        }
    }

    /// Starts a new measurement, marking detection time.
    #[must_use]
    pub fn start_measurement(&self, trade_id: &str) -> LatencyMeasurement {
        let trade_id = if trade_id.is_empty() {
            let inner = self.inner.lock();
            format!("trade-{}", inner.total_trades + 1)
        } else {
            trade_id.to_string()
        };

        let mut measurement = LatencyMeasurement::new(trade_id);
        measurement.mark_detected();
        measurement
    }

    /// Completes a measurement and adds it to the window.
    pub fn complete_measurement(&self, mut measurement: LatencyMeasurement) {
        measurement.mark_completed();

        if let Some(total) = measurement.total_ms() {
            if total < TARGET_TOTAL_MS {
                info!(
                    total_ms = total,
                    trade = %measurement.trade_id,
                    "Execution latency"
                );
            } else {
                warn!(
                    total_ms = total,
                    trade = %measurement.trade_id,
                    "Execution latency above target"
                );
            }
        }

        let mut inner = self.inner.lock();
        if inner.history.len() == self.max_history {
            inner.history.pop_front();
        }
        inner.history.push_back(measurement);
        inner.total_trades += 1;
    }

    /// P50/P95/P99 plus min/max/avg over the current window.
    #[must_use]
    pub fn percentiles(&self) -> LatencyPercentiles {
        let inner = self.inner.lock();
        let mut totals: Vec<f64> = inner
            .history
            .iter()
            .filter_map(LatencyMeasurement::total_ms)
            .collect();
        totals.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        if totals.is_empty() {
            return LatencyPercentiles {
                p50_ms: None,
                p95_ms: None,
                p99_ms: None,
                count: 0,
                min_ms: None,
                max_ms: None,
                avg_ms: None,
            };
        }

        let avg = totals.iter().sum::<f64>() / totals.len() as f64;
        LatencyPercentiles {
            p50_ms: Some(percentile(&totals, 50.0)),
            p95_ms: Some(percentile(&totals, 95.0)),
            p99_ms: Some(percentile(&totals, 99.0)),
            count: totals.len(),
            min_ms: totals.first().copied(),
            max_ms: totals.last().copied(),
            avg_ms: Some(avg),
        }
    }

    /// The `n` most recent measurements.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<LatencyReport> {
        let inner = self.inner.lock();
        inner
            .history
            .iter()
            .rev()
            .take(n)
            .map(LatencyMeasurement::report)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect()
    }

    /// Full status block.
    #[must_use]
    pub fn status(&self) -> LatencyStatus {
        let percentiles = self.percentiles();
        let meets_target = percentiles.p95_ms.map(|p95| p95 < TARGET_TOTAL_MS);
        let total_trades_measured = self.inner.lock().total_trades;

        LatencyStatus {
            total_trades_measured,
            percentiles,
            target_ms: TARGET_TOTAL_MS,
            meets_target,
        }
    }
}

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Percentile by linear interpolation at index `(n−1)·p/100`.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }

    let k = (sorted.len() - 1) as f64 * pct / 100.0;
    let floor = k.floor() as usize;
    let ceil = floor + 1;
    if ceil >= sorted.len() {
        return sorted[sorted.len() - 1];
    }

    let lower = sorted[floor] * (ceil as f64 - k);
    let upper = sorted[ceil] * (k - floor as f64);
    lower + upper
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn record_sample(tracker: &LatencyTracker, sleep_ms: u64) {
        let mut m = tracker.start_measurement("");
        m.mark_leg1_sent();
        m.mark_leg1_filled();
        m.mark_leg2_sent();
        m.mark_leg2_filled();
        if sleep_ms > 0 {
            thread::sleep(Duration::from_millis(sleep_ms));
        }
        tracker.complete_measurement(m);
    }

    // ==================== Measurement Tests ====================

    #[test]
    fn test_measurement_spans() {
        let tracker = LatencyTracker::new();
        let mut m = tracker.start_measurement("t-1");

        m.mark_leg1_sent();
        thread::sleep(Duration::from_millis(5));
        m.mark_leg1_filled();
        m.mark_leg2_sent();
        m.mark_leg2_filled();
        m.mark_completed();

        assert!(m.detection_to_leg1_ms().is_some());
        assert!(m.leg1_fill_ms().unwrap() >= 5.0);
        assert!(m.leg1_to_leg2_ms().unwrap() >= m.leg1_fill_ms().unwrap() - 1.0);
        assert!(m.total_ms().unwrap() >= 5.0);
    }

    #[test]
    fn test_incomplete_measurement_has_no_spans() {
        let m = LatencyMeasurement::new("t-2");

        assert!(m.detection_to_leg1_ms().is_none());
        assert!(m.total_ms().is_none());

        let report = m.report();
        assert_eq!(report.trade_id, "t-2");
        assert!(report.total_ms.is_none());
    }

    #[test]
    fn test_auto_generated_trade_ids() {
        let tracker = LatencyTracker::new();
        let first = tracker.start_measurement("");
        assert_eq!(first.trade_id, "trade-1");
        tracker.complete_measurement(first);

        let second = tracker.start_measurement("");
        assert_eq!(second.trade_id, "trade-2");
    }

    // ==================== Window Tests ====================

    #[test]
    fn test_history_is_bounded() {
        let tracker = LatencyTracker::with_max_history(3);
        for _ in 0..5 {
            record_sample(&tracker, 0);
        }

        let percentiles = tracker.percentiles();
        assert_eq!(percentiles.count, 3);
        assert_eq!(tracker.status().total_trades_measured, 5);
    }

    #[test]
    fn test_recent_returns_newest_last() {
        let tracker = LatencyTracker::new();
        for _ in 0..4 {
            record_sample(&tracker, 0);
        }

        let recent = tracker.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].trade_id, "trade-3");
        assert_eq!(recent[1].trade_id, "trade-4");
    }

    // ==================== Percentile Tests ====================

    #[test]
    fn test_percentile_interpolation() {
        let sorted = [10.0, 20.0, 30.0, 40.0];

        // k = 3 * 0.5 = 1.5 → midway between 20 and 30.
        assert!((percentile(&sorted, 50.0) - 25.0).abs() < 1e-9);
        assert!((percentile(&sorted, 0.0) - 10.0).abs() < 1e-9);
        assert!((percentile(&sorted, 100.0) - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_percentile_single_sample() {
        assert!((percentile(&[42.0], 95.0) - 42.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_percentiles() {
        let tracker = LatencyTracker::new();
        let percentiles = tracker.percentiles();

        assert_eq!(percentiles.count, 0);
        assert!(percentiles.p50_ms.is_none());
        assert!(percentiles.p95_ms.is_none());
        assert!(percentiles.avg_ms.is_none());
    }

    // ==================== Status Tests ====================

    #[test]
    fn test_status_no_samples_has_no_verdict() {
        let tracker = LatencyTracker::new();
        let status = tracker.status();

        assert_eq!(status.total_trades_measured, 0);
        assert!(status.meets_target.is_none());
        assert!((status.target_ms - 500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_fast_samples_meet_target() {
        let tracker = LatencyTracker::new();
        for _ in 0..10 {
            record_sample(&tracker, 0);
        }

        let status = tracker.status();
        assert_eq!(status.meets_target, Some(true));
        assert!(status.percentiles.p95_ms.unwrap() < 500.0);
    }

    #[test]
    fn test_status_serializes() {
        let tracker = LatencyTracker::new();
        record_sample(&tracker, 0);

        let json = serde_json::to_value(tracker.status()).unwrap();
        assert_eq!(json["total_trades_measured"], 1);
        assert!(json["percentiles"]["p50_ms"].is_number());
    }
}
