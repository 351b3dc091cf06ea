//! # store — closed-trade persistence
//!
//! [`HistoryStore`] is the append/read contract the desk needs:
//! `append_trade` is an idempotent upsert keyed by trade id, `load_all_trades`
//! returns every record in insertion order and is called once at startup.
//!
//! * [`SqliteHistoryStore`] — `sqlx` SQLite pool, the default (`DATABASE_URL=sqlite://trades.db`)
//! * [`MemoryHistoryStore`] — process-local, for `DATABASE_URL=memory` and tests

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tokio::sync::Mutex;
use tracing::info;

use crate::error::AppError;
use crate::models::{CloseReason, HistoryRecord, Side};

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append_trade(&self, record: &HistoryRecord) -> Result<(), AppError>;
    async fn load_all_trades(&self) -> Result<Vec<HistoryRecord>, AppError>;
}

// ─── SQLite ───────────────────────────────────────────────────────────────────

pub struct SqliteHistoryStore {
    pool: SqlitePool,
}

impl SqliteHistoryStore {
    /// Open (creating if needed) the database at `database_url` and run the
    /// embedded migration.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        info!(database_url, "Opening trade history database...");

        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid DATABASE_URL '{database_url}'"))?
            .create_if_missing(true);

        // An in-memory database lives and dies with its connection: keep one.
        let in_memory = database_url.contains(":memory:");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(4)
        };

        let pool = pool_options
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await
            .context("Failed to open SQLite database")?;

        migrate(&pool).await?;

        info!("✅ Trade history database ready");
        Ok(Self { pool })
    }
}

/// Create the `trades` table, or bring an older one up to date.
///
/// Files written before close reasons were recorded have no `close_reason`
/// column; their rows are read back as market closes.
async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(include_str!("../migrations/001_trades.sql"))
        .execute(pool)
        .await
        .context("Failed to run migration 001_trades.sql")?;

    let columns: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info('trades')")
        .fetch_all(pool)
        .await
        .context("Failed to inspect trades table")?;

    if !columns.iter().any(|c| c == "close_reason") {
        info!("Upgrading trades table: adding close_reason");
        sqlx::query("ALTER TABLE trades ADD COLUMN close_reason TEXT NOT NULL DEFAULT 'MARKET'")
            .execute(pool)
            .await
            .context("Failed to add close_reason column")?;
    }
    Ok(())
}

/// Accepts what this store writes (RFC 3339) and SQLite's own
/// `CURRENT_TIMESTAMP` text (`YYYY-MM-DD HH:MM:SS`, UTC).
fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[derive(sqlx::FromRow)]
struct TradeRow {
    id: String,
    symbol: String,
    side: String,
    size: f64,
    entry: f64,
    close: f64,
    net_pnl: f64,
    close_reason: String,
    ts: String,
}

impl TryFrom<TradeRow> for HistoryRecord {
    type Error = AppError;

    fn try_from(row: TradeRow) -> Result<Self, Self::Error> {
        let side = row
            .side
            .parse::<Side>()
            .map_err(|e| AppError::Persistence(format!("trade {}: {e}", row.id)))?;
        let reason = CloseReason::parse(&row.close_reason).ok_or_else(|| {
            AppError::Persistence(format!("trade {}: unknown close reason '{}'", row.id, row.close_reason))
        })?;

        let closed_at = parse_ts(&row.ts).ok_or_else(|| {
            AppError::Persistence(format!("trade {}: unreadable timestamp '{}'", row.id, row.ts))
        })?;

        Ok(HistoryRecord {
            id: row.id,
            symbol: row.symbol,
            side,
            size: row.size,
            entry_price: row.entry,
            close_price: row.close,
            net_pnl: row.net_pnl,
            reason,
            closed_at,
        })
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn append_trade(&self, record: &HistoryRecord) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO trades (id, symbol, side, size, entry, close, net_pnl, close_reason, ts)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
              symbol       = excluded.symbol,
              side         = excluded.side,
              size         = excluded.size,
              entry        = excluded.entry,
              close        = excluded.close,
              net_pnl      = excluded.net_pnl,
              close_reason = excluded.close_reason,
              ts           = excluded.ts
            "#,
        )
        .bind(&record.id)
        .bind(&record.symbol)
        .bind(record.side.as_str())
        .bind(record.size)
        .bind(record.entry_price)
        .bind(record.close_price)
        .bind(record.net_pnl)
        .bind(record.reason.as_str())
        .bind(record.closed_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Persistence(format!("append_trade {} failed: {e}", record.id)))?;

        Ok(())
    }

    async fn load_all_trades(&self) -> Result<Vec<HistoryRecord>, AppError> {
        let rows: Vec<TradeRow> = sqlx::query_as(
            r#"
            SELECT id, symbol, side, size, entry, close, net_pnl, close_reason, ts
            FROM trades
            ORDER BY ts, rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Persistence(format!("load_all_trades failed: {e}")))?;

        rows.into_iter().map(HistoryRecord::try_from).collect()
    }
}

// ─── In-memory ────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryHistoryStore {
    records: Mutex<Vec<HistoryRecord>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append_trade(&self, record: &HistoryRecord) -> Result<(), AppError> {
        let mut records = self.records.lock().await;
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
        Ok(())
    }

    async fn load_all_trades(&self) -> Result<Vec<HistoryRecord>, AppError> {
        Ok(self.records.lock().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, net_pnl: f64, secs: i64) -> HistoryRecord {
        HistoryRecord {
            id: id.into(),
            symbol: "BTCUSDT".into(),
            side: Side::Sell,
            size: 0.5,
            entry_price: 60_000.0,
            close_price: 59_000.0,
            net_pnl,
            reason: CloseReason::Limit,
            closed_at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap() + chrono::Duration::seconds(secs),
        }
    }

    #[tokio::test]
    async fn test_sqlite_round_trip_in_insertion_order() {
        let store = SqliteHistoryStore::connect("sqlite::memory:").await.unwrap();
        let a = record("BTCUSDT-aaaaaa", 476.4, 0);
        let b = record("BTCUSDT-bbbbbb", -12.0, 10);

        store.append_trade(&a).await.unwrap();
        store.append_trade(&b).await.unwrap();

        assert_eq!(store.load_all_trades().await.unwrap(), vec![a, b]);
    }

    #[tokio::test]
    async fn test_sqlite_append_is_idempotent_upsert() {
        let store = SqliteHistoryStore::connect("sqlite::memory:").await.unwrap();
        let a = record("BTCUSDT-aaaaaa", 476.4, 0);

        store.append_trade(&a).await.unwrap();
        store.append_trade(&a).await.unwrap();

        assert_eq!(store.load_all_trades().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_older_trades_file_is_upgraded_on_open() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE trades (id TEXT PRIMARY KEY, symbol TEXT, side TEXT, size REAL, \
             entry REAL, close REAL, net_pnl REAL, ts DATETIME DEFAULT CURRENT_TIMESTAMP)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO trades (id, symbol, side, size, entry, close, net_pnl, ts) \
             VALUES ('BTCUSDT-0a0b0c', 'BTCUSDT', 'BUY', 1.0, 50000.0, 51000.0, 959.6, '2025-03-04 05:06:07')",
        )
        .execute(&pool)
        .await
        .unwrap();

        migrate(&pool).await.unwrap();
        migrate(&pool).await.unwrap();
        let store = SqliteHistoryStore { pool };

        let loaded = store.load_all_trades().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].reason, CloseReason::Market);
        assert_eq!(loaded[0].side, Side::Buy);
        assert_eq!(loaded[0].closed_at, Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap());

        let newer = record("BTCUSDT-dddddd", -3.0, 0);
        store.append_trade(&newer).await.unwrap();
        assert_eq!(store.load_all_trades().await.unwrap()[1], newer);
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(parse_ts("2025-03-04T05:06:07+00:00"), Some(expected));
        assert_eq!(parse_ts("2025-03-04 05:06:07"), Some(expected));
        assert_eq!(parse_ts("2025-03-04 07:06:07+02:00"), Some(expected));
        assert_eq!(parse_ts("yesterday"), None);
    }

    #[tokio::test]
    async fn test_memory_store_upserts_by_id() {
        let store = MemoryHistoryStore::new();
        let a = record("ETHUSDT-010101", 1.0, 0);
        let mut a2 = a.clone();
        a2.net_pnl = 2.0;

        store.append_trade(&a).await.unwrap();
        store.append_trade(&a2).await.unwrap();

        assert_eq!(store.load_all_trades().await.unwrap(), vec![a2]);
    }
}
