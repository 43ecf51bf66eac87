//! SQLite store.

use anyhow::Result;
use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::{debug, info};

/// Current schema version. Applying the same version twice is a no-op.
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS trades (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp         TEXT NOT NULL,
    poly_leg          TEXT NOT NULL,
    kalshi_leg        TEXT NOT NULL,
    kalshi_strike     REAL NOT NULL,
    poly_cost         REAL NOT NULL,
    kalshi_cost       REAL NOT NULL,
    total_cost        REAL NOT NULL,
    fee_adjusted_cost REAL NOT NULL DEFAULT 0.0,
    net_margin        REAL NOT NULL DEFAULT 0.0,
    size_contracts    INTEGER NOT NULL DEFAULT 1,
    poly_fill_price   REAL,
    kalshi_fill_price REAL,
    actual_pnl        REAL,
    status            TEXT NOT NULL DEFAULT 'pending',
    error_message     TEXT,
    dry_run           INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS positions (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    position_id     TEXT UNIQUE NOT NULL,
    venue           TEXT NOT NULL,
    side            TEXT NOT NULL,
    ticker          TEXT NOT NULL,
    entry_price     REAL NOT NULL,
    size            INTEGER NOT NULL,
    cost_usd        REAL NOT NULL,
    status          TEXT NOT NULL DEFAULT 'open',
    linked_position TEXT,
    arb_id          TEXT,
    opened_at       TEXT NOT NULL,
    closed_at       TEXT
);

CREATE TABLE IF NOT EXISTS opportunities (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp     TEXT NOT NULL,
    kalshi_strike REAL NOT NULL,
    poly_leg      TEXT NOT NULL,
    kalshi_leg    TEXT NOT NULL,
    poly_cost     REAL NOT NULL,
    kalshi_cost   REAL NOT NULL,
    total_cost    REAL NOT NULL,
    net_margin    REAL NOT NULL,
    was_executed  INTEGER NOT NULL DEFAULT 0,
    skip_reason   TEXT
);

CREATE TABLE IF NOT EXISTS bot_events (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp  TEXT NOT NULL,
    event_type TEXT NOT NULL,
    severity   TEXT NOT NULL DEFAULT 'info',
    details    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS schema_version (
    version    INTEGER NOT NULL,
    applied_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_trades_timestamp ON trades(timestamp);
CREATE INDEX IF NOT EXISTS idx_trades_status ON trades(status);
CREATE INDEX IF NOT EXISTS idx_positions_status ON positions(status);
CREATE INDEX IF NOT EXISTS idx_positions_venue ON positions(venue);
CREATE INDEX IF NOT EXISTS idx_opportunities_timestamp ON opportunities(timestamp);
CREATE INDEX IF NOT EXISTS idx_bot_events_type ON bot_events(event_type);
CREATE INDEX IF NOT EXISTS idx_bot_events_timestamp ON bot_events(timestamp);
";

/// UTC now in ISO-8601 with millisecond precision.
fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// UTC date prefix (`YYYY-MM-DD`) for same-day range filters.
fn today_prefix() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// A trade attempt to record.
#[derive(Debug, Clone)]
pub struct TradeRecord {
    pub poly_leg: String,
    pub kalshi_leg: String,
    pub kalshi_strike: Decimal,
    pub poly_cost: Decimal,
    pub kalshi_cost: Decimal,
    pub total_cost: Decimal,
    pub fee_adjusted_cost: Decimal,
    pub net_margin: Decimal,
    pub size_contracts: u32,
    pub status: String,
    pub dry_run: bool,
    pub error_message: Option<String>,
}

/// Trade row as stored.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TradeRow {
    pub id: i64,
    pub timestamp: String,
    pub poly_leg: String,
    pub kalshi_leg: String,
    pub kalshi_strike: f64,
    pub poly_cost: f64,
    pub kalshi_cost: f64,
    pub total_cost: f64,
    pub fee_adjusted_cost: f64,
    pub net_margin: f64,
    pub size_contracts: i64,
    pub actual_pnl: Option<f64>,
    pub status: String,
    pub error_message: Option<String>,
    pub dry_run: i64,
}

/// Position row as stored.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PositionRow {
    pub id: i64,
    pub position_id: String,
    pub venue: String,
    pub side: String,
    pub ticker: String,
    pub entry_price: f64,
    pub size: i64,
    pub cost_usd: f64,
    pub status: String,
    pub linked_position: Option<String>,
    pub arb_id: Option<String>,
    pub opened_at: String,
    pub closed_at: Option<String>,
}

/// Bot event row as stored.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EventRow {
    pub id: i64,
    pub timestamp: String,
    pub event_type: String,
    pub severity: String,
    pub details: String,
}

/// Counts and aggregates for monitoring. Never raw rows.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub trades_total: i64,
    pub trades_today: i64,
    pub open_positions: i64,
    pub total_open_exposure: f64,
    pub opportunities_today: i64,
    pub daily_pnl: f64,
}

/// Append-only SQLite store.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Opens (and creates if missing) the database at `db_path`, applying the
    /// schema. WAL journal mode allows concurrent reads during writes.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created or the schema
    /// cannot be applied.
    pub async fn open(db_path: &str) -> Result<Self> {
        if let Some(dir) = std::path::Path::new(db_path).parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        info!(db_path, version = SCHEMA_VERSION, "Database initialized");
        Ok(store)
    }

    /// Opens an in-memory database for tests.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be applied.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Applies the schema and records the version. Idempotent.
    async fn init_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;

        let current: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(&self.pool)
            .await?;

        if current.unwrap_or(0) < SCHEMA_VERSION {
            sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)")
                .bind(SCHEMA_VERSION)
                .bind(now_iso())
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    /// Applied schema version.
    ///
    /// # Errors
    /// Returns an error on query failure.
    pub async fn schema_version(&self) -> Result<i64> {
        let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(&self.pool)
            .await?;
        Ok(version.unwrap_or(0))
    }

    // ── Trades ───────────────────────────────────────────────────────────

    /// Records a trade attempt. Returns the trade id.
    ///
    /// # Errors
    /// Returns an error on write failure.
    pub async fn record_trade(&self, trade: &TradeRecord) -> Result<i64> {
        let result = sqlx::query(
            r"INSERT INTO trades
              (timestamp, poly_leg, kalshi_leg, kalshi_strike, poly_cost, kalshi_cost,
               total_cost, fee_adjusted_cost, net_margin, size_contracts, status,
               dry_run, error_message)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )
        .bind(now_iso())
        .bind(&trade.poly_leg)
        .bind(&trade.kalshi_leg)
        .bind(to_f64(trade.kalshi_strike))
        .bind(to_f64(trade.poly_cost))
        .bind(to_f64(trade.kalshi_cost))
        .bind(to_f64(trade.total_cost))
        .bind(to_f64(trade.fee_adjusted_cost))
        .bind(to_f64(trade.net_margin))
        .bind(i64::from(trade.size_contracts))
        .bind(&trade.status)
        .bind(i64::from(trade.dry_run))
        .bind(&trade.error_message)
        .execute(&self.pool)
        .await?;

        let trade_id = result.last_insert_rowid();
        debug!(trade_id, status = %trade.status, "Trade recorded");
        Ok(trade_id)
    }

    /// Updates a trade's status and error message.
    ///
    /// # Errors
    /// Returns an error on write failure.
    pub async fn update_trade_status(
        &self,
        trade_id: i64,
        status: &str,
        error: Option<&str>,
    ) -> Result<()> {
        sqlx::query("UPDATE trades SET status = ?1, error_message = ?2 WHERE id = ?3")
            .bind(status)
            .bind(error)
            .bind(trade_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// All trades from today (UTC), newest first.
    ///
    /// # Errors
    /// Returns an error on query failure.
    pub async fn get_trades_today(&self) -> Result<Vec<TradeRow>> {
        let rows = sqlx::query_as::<_, TradeRow>(
            "SELECT * FROM trades WHERE timestamp >= ?1 ORDER BY timestamp DESC",
        )
        .bind(today_prefix())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Sum of realized PnL over today's trades.
    ///
    /// # Errors
    /// Returns an error on query failure.
    pub async fn daily_pnl(&self) -> Result<f64> {
        let pnl: f64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(actual_pnl), 0.0) FROM trades
             WHERE timestamp >= ?1 AND actual_pnl IS NOT NULL",
        )
        .bind(today_prefix())
        .fetch_one(&self.pool)
        .await?;
        Ok(pnl)
    }

    // ── Positions ────────────────────────────────────────────────────────

    /// Records a new open position.
    ///
    /// # Errors
    /// Returns an error on write failure.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_position(
        &self,
        position_id: &str,
        venue: &str,
        side: &str,
        ticker: &str,
        entry_price: Decimal,
        size: u32,
        cost_usd: Decimal,
        linked_position: Option<&str>,
        arb_id: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r"INSERT INTO positions
              (position_id, venue, side, ticker, entry_price, size, cost_usd,
               linked_position, arb_id, opened_at)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(position_id)
        .bind(venue)
        .bind(side)
        .bind(ticker)
        .bind(to_f64(entry_price))
        .bind(i64::from(size))
        .bind(to_f64(cost_usd))
        .bind(linked_position)
        .bind(arb_id)
        .bind(now_iso())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Marks a position closed.
    ///
    /// # Errors
    /// Returns an error on write failure.
    pub async fn close_position(&self, position_id: &str, status: &str) -> Result<()> {
        sqlx::query(
            "UPDATE positions SET status = ?1, closed_at = ?2 WHERE position_id = ?3",
        )
        .bind(status)
        .bind(now_iso())
        .bind(position_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All open positions, newest first.
    ///
    /// # Errors
    /// Returns an error on query failure.
    pub async fn get_open_positions(&self) -> Result<Vec<PositionRow>> {
        let rows = sqlx::query_as::<_, PositionRow>(
            "SELECT * FROM positions WHERE status = 'open' ORDER BY opened_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Total USD in open positions.
    ///
    /// # Errors
    /// Returns an error on query failure.
    pub async fn total_open_exposure(&self) -> Result<f64> {
        let exposure: f64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(cost_usd), 0.0) FROM positions WHERE status = 'open'",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(exposure)
    }

    // ── Opportunities ────────────────────────────────────────────────────

    /// Records a detected opportunity and mirrors it as an `opportunity`
    /// event so same-day event queries surface it. Returns the id.
    ///
    /// # Errors
    /// Returns an error on write failure.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_opportunity(
        &self,
        kalshi_strike: Decimal,
        poly_leg: &str,
        kalshi_leg: &str,
        poly_cost: Decimal,
        kalshi_cost: Decimal,
        total_cost: Decimal,
        net_margin: Decimal,
        was_executed: bool,
        skip_reason: Option<&str>,
    ) -> Result<i64> {
        let result = sqlx::query(
            r"INSERT INTO opportunities
              (timestamp, kalshi_strike, poly_leg, kalshi_leg, poly_cost, kalshi_cost,
               total_cost, net_margin, was_executed, skip_reason)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(now_iso())
        .bind(to_f64(kalshi_strike))
        .bind(poly_leg)
        .bind(kalshi_leg)
        .bind(to_f64(poly_cost))
        .bind(to_f64(kalshi_cost))
        .bind(to_f64(total_cost))
        .bind(to_f64(net_margin))
        .bind(i64::from(was_executed))
        .bind(skip_reason)
        .execute(&self.pool)
        .await?;

        let details = format!(
            "strike={kalshi_strike} {poly_leg}+{kalshi_leg} total=${total_cost} net=${net_margin}"
        );
        self.log_event("opportunity", &details, "info").await?;

        Ok(result.last_insert_rowid())
    }

    // ── Bot Events ───────────────────────────────────────────────────────

    /// Logs a bot event. The caller is responsible for keeping secrets out
    /// of the details string. Returns the id.
    ///
    /// # Errors
    /// Returns an error on write failure.
    pub async fn log_event(&self, event_type: &str, details: &str, severity: &str) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO bot_events (timestamp, event_type, severity, details) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(now_iso())
        .bind(event_type)
        .bind(severity)
        .bind(details)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Recent events, newest first, optionally filtered by type.
    ///
    /// # Errors
    /// Returns an error on query failure.
    pub async fn get_recent_events(
        &self,
        limit: i64,
        event_type: Option<&str>,
    ) -> Result<Vec<EventRow>> {
        let rows = match event_type {
            Some(event_type) => {
                sqlx::query_as::<_, EventRow>(
                    "SELECT * FROM bot_events WHERE event_type = ?1 ORDER BY timestamp DESC LIMIT ?2",
                )
                .bind(event_type)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, EventRow>(
                    "SELECT * FROM bot_events ORDER BY timestamp DESC LIMIT ?1",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows)
    }

    /// Events in chronological order, optionally filtered by type and a
    /// trailing day window (`days = 0` means all time).
    ///
    /// # Errors
    /// Returns an error on query failure.
    pub async fn get_events(&self, event_type: Option<&str>, days: u32) -> Result<Vec<EventRow>> {
        let mut conditions = Vec::new();
        if event_type.is_some() {
            conditions.push("event_type = ?1".to_string());
        }
        let cutoff = (days > 0).then(|| {
            (Utc::now() - ChronoDuration::days(i64::from(days)))
                .to_rfc3339_opts(SecondsFormat::Millis, true)
        });
        if cutoff.is_some() {
            conditions.push(format!(
                "timestamp >= ?{}",
                if event_type.is_some() { 2 } else { 1 }
            ));
        }

        let where_clause = if conditions.is_empty() {
            "1=1".to_string()
        } else {
            conditions.join(" AND ")
        };
        let sql =
            format!("SELECT * FROM bot_events WHERE {where_clause} ORDER BY timestamp ASC");

        let mut query = sqlx::query_as::<_, EventRow>(&sql);
        if let Some(event_type) = event_type {
            query = query.bind(event_type.to_string());
        }
        if let Some(cutoff) = cutoff {
            query = query.bind(cutoff);
        }

        Ok(query.fetch_all(&self.pool).await?)
    }

    // ── Stats ────────────────────────────────────────────────────────────

    /// Counts and aggregates for the status surface.
    ///
    /// # Errors
    /// Returns an error on query failure.
    pub async fn stats(&self) -> Result<StoreStats> {
        let trades_total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM trades")
            .fetch_one(&self.pool)
            .await?;
        let trades_today: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM trades WHERE timestamp >= ?1")
                .bind(today_prefix())
                .fetch_one(&self.pool)
                .await?;
        let open_positions: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM positions WHERE status = 'open'")
                .fetch_one(&self.pool)
                .await?;
        let opportunities_today: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM opportunities WHERE timestamp >= ?1")
                .bind(today_prefix())
                .fetch_one(&self.pool)
                .await?;

        Ok(StoreStats {
            trades_total,
            trades_today,
            open_positions,
            total_open_exposure: self.total_open_exposure().await?,
            opportunities_today,
            daily_pnl: self.daily_pnl().await?,
        })
    }

    /// Row count in an arbitrary table, for tests and health checks.
    ///
    /// # Errors
    /// Returns an error on query failure.
    pub async fn count_events(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM bot_events")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn trade() -> TradeRecord {
        TradeRecord {
            poly_leg: "Down".to_string(),
            kalshi_leg: "Yes".to_string(),
            kalshi_strike: dec!(95500),
            poly_cost: dec!(0.35),
            kalshi_cost: dec!(0.55),
            total_cost: dec!(0.90),
            fee_adjusted_cost: dec!(0.935),
            net_margin: dec!(0.065),
            size_contracts: 1,
            status: "pending".to_string(),
            dry_run: true,
            error_message: None,
        }
    }

    // ==================== Schema Tests ====================

    #[tokio::test]
    async fn test_schema_applies_once() {
        let store = Store::in_memory().await.unwrap();
        assert_eq!(store.schema_version().await.unwrap(), SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_schema_reapply_is_noop() {
        let store = Store::in_memory().await.unwrap();
        store.init_schema().await.unwrap();
        store.init_schema().await.unwrap();

        // Still exactly one version row.
        let versions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(versions, 1);
    }

    // ==================== Trade Tests ====================

    #[tokio::test]
    async fn test_record_and_query_trade() {
        let store = Store::in_memory().await.unwrap();

        let id = store.record_trade(&trade()).await.unwrap();
        assert!(id > 0);

        let today = store.get_trades_today().await.unwrap();
        assert_eq!(today.len(), 1);
        assert_eq!(today[0].poly_leg, "Down");
        assert_eq!(today[0].status, "pending");
        assert_eq!(today[0].dry_run, 1);
        assert!((today[0].total_cost - 0.90).abs() < 1e-9);
        // ISO-8601 UTC with millisecond precision.
        assert!(today[0].timestamp.ends_with('Z'));
        assert!(today[0].timestamp.contains('.'));
    }

    #[tokio::test]
    async fn test_update_trade_status() {
        let store = Store::in_memory().await.unwrap();
        let id = store.record_trade(&trade()).await.unwrap();

        store
            .update_trade_status(id, "failed", Some("leg 2 rejected"))
            .await
            .unwrap();

        let rows = store.get_trades_today().await.unwrap();
        assert_eq!(rows[0].status, "failed");
        assert_eq!(rows[0].error_message.as_deref(), Some("leg 2 rejected"));
    }

    #[tokio::test]
    async fn test_daily_pnl_sums_settled_trades() {
        let store = Store::in_memory().await.unwrap();
        let id = store.record_trade(&trade()).await.unwrap();

        sqlx::query("UPDATE trades SET actual_pnl = 0.06 WHERE id = ?1")
            .bind(id)
            .execute(&store.pool)
            .await
            .unwrap();

        assert!((store.daily_pnl().await.unwrap() - 0.06).abs() < 1e-9);
    }

    // ==================== Position Tests ====================

    #[tokio::test]
    async fn test_position_lifecycle() {
        let store = Store::in_memory().await.unwrap();

        store
            .record_position(
                "POS-000001",
                "kalshi",
                "long",
                "KXBTCD-95500",
                dec!(0.55),
                1,
                dec!(0.55),
                None,
                Some("ARB-000001"),
            )
            .await
            .unwrap();

        let open = store.get_open_positions().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].position_id, "POS-000001");
        assert!((store.total_open_exposure().await.unwrap() - 0.55).abs() < 1e-9);

        store.close_position("POS-000001", "settled").await.unwrap();

        assert!(store.get_open_positions().await.unwrap().is_empty());
        assert!(store.total_open_exposure().await.unwrap().abs() < 1e-9);
    }

    // ==================== Opportunity / Event Tests ====================

    #[tokio::test]
    async fn test_record_opportunity_visible_in_same_day_events() {
        let store = Store::in_memory().await.unwrap();

        let id = store
            .record_opportunity(
                dec!(95500),
                "Down",
                "Yes",
                dec!(0.35),
                dec!(0.55),
                dec!(0.90),
                dec!(0.065),
                false,
                Some("dry run"),
            )
            .await
            .unwrap();
        assert!(id > 0);

        let events = store.get_events(Some("opportunity"), 1).await.unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].details.contains("95500"));
    }

    #[tokio::test]
    async fn test_event_filters() {
        let store = Store::in_memory().await.unwrap();
        store
            .log_event("kill_switch", "activated via API", "critical")
            .await
            .unwrap();
        store.log_event("info", "heartbeat", "info").await.unwrap();

        let all = store.get_recent_events(50, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let critical = store
            .get_recent_events(50, Some("kill_switch"))
            .await
            .unwrap();
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].severity, "critical");

        // Chronological order for the windowed query.
        let window = store.get_events(None, 0).await.unwrap();
        assert_eq!(window.len(), 2);
        assert!(window[0].timestamp <= window[1].timestamp);
    }

    #[tokio::test]
    async fn test_recent_events_limit() {
        let store = Store::in_memory().await.unwrap();
        for i in 0..5 {
            store
                .log_event("tick", &format!("n={i}"), "info")
                .await
                .unwrap();
        }

        let limited = store.get_recent_events(3, None).await.unwrap();
        assert_eq!(limited.len(), 3);
    }

    // ==================== Stats Tests ====================

    #[tokio::test]
    async fn test_stats_aggregates() {
        let store = Store::in_memory().await.unwrap();
        store.record_trade(&trade()).await.unwrap();
        store
            .record_position(
                "POS-000001",
                "kalshi",
                "long",
                "T",
                dec!(0.5),
                1,
                dec!(0.5),
                None,
                None,
            )
            .await
            .unwrap();
        store
            .record_opportunity(
                dec!(95000),
                "Up",
                "No",
                dec!(0.4),
                dec!(0.5),
                dec!(0.9),
                dec!(0.065),
                true,
                None,
            )
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.trades_total, 1);
        assert_eq!(stats.trades_today, 1);
        assert_eq!(stats.open_positions, 1);
        assert_eq!(stats.opportunities_today, 1);
        assert!((stats.total_open_exposure - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_stats_serialize_counts_only() {
        let store = Store::in_memory().await.unwrap();
        let json = serde_json::to_value(store.stats().await.unwrap()).unwrap();

        assert_eq!(json["trades_total"], 0);
        assert!(json.get("rows").is_none());
    }
}
