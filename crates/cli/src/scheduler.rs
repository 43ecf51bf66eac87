//! Periodic housekeeping tasks.
//!
//! Hourly: reset the engine's trade counter. At UTC midnight: reset the
//! engine's daily loss and the risk manager's daily counters. Every polling
//! interval: probe data staleness on the breaker.

use crate::LiveOrderEngine;
use btc_arb_safety::{CircuitBreaker, RiskManager};
use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// Time until the next top of hour.
#[must_use]
pub fn until_next_hour(now: DateTime<Utc>) -> Duration {
    let next = (now + chrono::Duration::hours(1))
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);
    (next - now).to_std().unwrap_or(Duration::from_secs(3600))
}

/// Time until the next UTC midnight.
#[must_use]
pub fn until_next_midnight(now: DateTime<Utc>) -> Duration {
    let tomorrow = now.date_naive() + chrono::Duration::days(1);
    let next = Utc
        .with_ymd_and_hms(tomorrow.year(), tomorrow.month(), tomorrow.day(), 0, 0, 0)
        .single()
        .unwrap_or(now);
    (next - now).to_std().unwrap_or(Duration::from_secs(86400))
}

/// Spawns the three periodic tasks and returns their handles.
pub fn spawn_all(
    engine: Arc<LiveOrderEngine>,
    risk: Arc<RiskManager>,
    breaker: Arc<CircuitBreaker>,
    poll_interval: Duration,
) -> Vec<JoinHandle<()>> {
    let hourly = {
        let engine = engine.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(until_next_hour(Utc::now())).await;
                engine.reset_hourly_counter();
            }
        })
    };

    let daily = tokio::spawn(async move {
        loop {
            tokio::time::sleep(until_next_midnight(Utc::now())).await;
            engine.reset_daily_loss();
            risk.reset_daily();
            info!("Daily resets applied at UTC midnight");
        }
    });

    let staleness = tokio::spawn(async move {
        let mut interval = tokio::time::interval(poll_interval);
        loop {
            interval.tick().await;
            breaker.check_data_staleness();
        }
    });

    vec![hourly, daily, staleness]
}
