//! SQLite-backed columnar store: three append-only tables mirroring the
//! entity schemas (§6), keyed conceptually by `(underlying_id, interval_ms,
//! ts)` for candles.

use async_trait::async_trait;
use equity_core::entity::{Candle, Print, Quote};
use equity_core::store::error::StoreError;
use equity_core::store::port::{CandleStore, PrintStore, QuoteStore};
use rust_decimal::Decimal;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::path::Path;
use std::str::FromStr;

/// Single connection pool shared across all three append-only tables.
pub struct SqliteEquityStore {
    pool: SqlitePool,
}

impl SqliteEquityStore {
    /// Opens (creating if absent) the database file at `path`.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| StoreError::InitError(e.to_string()))?;

        Ok(Self { pool })
    }

    /// An in-memory store useful for tests and local demos.
    pub async fn connect_in_memory() -> Result<Self, StoreError> {
        Self::connect(":memory:").await
    }

    /// Closes the connection pool. Part of the shutdown sequence (§5 step 6).
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Exposes the underlying pool for integration tests that need to read
    /// back rows the `PrintStore`/`QuoteStore`/`CandleStore` ports don't
    /// query by design (they are append-only write ports).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn decimal_to_text(value: Decimal) -> String {
        value.to_string()
    }

    fn decimal_from_text(value: &str) -> Result<Decimal, StoreError> {
        Decimal::from_str(value).map_err(|e| StoreError::Database(e.to_string()))
    }
}

#[async_trait]
impl PrintStore for SqliteEquityStore {
    async fn ensure_table(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS equity_prints (
                underlying_id TEXT NOT NULL,
                ts INTEGER NOT NULL,
                seq INTEGER NOT NULL,
                source_ts INTEGER NOT NULL,
                ingest_ts INTEGER NOT NULL,
                trace_id TEXT NOT NULL,
                price TEXT NOT NULL,
                size INTEGER NOT NULL,
                exchange TEXT NOT NULL,
                off_exchange_flag INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::InitError(e.to_string()))?;
        Ok(())
    }

    async fn insert(&self, print: &Print) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO equity_prints
                (underlying_id, ts, seq, source_ts, ingest_ts, trace_id, price, size, exchange, off_exchange_flag)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&print.underlying_id)
        .bind(print.ts)
        .bind(print.seq)
        .bind(print.source_ts)
        .bind(print.ingest_ts)
        .bind(&print.trace_id)
        .bind(Self::decimal_to_text(print.price))
        .bind(print.size)
        .bind(&print.exchange)
        .bind(i32::from(print.off_exchange_flag))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl QuoteStore for SqliteEquityStore {
    async fn ensure_table(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS equity_quotes (
                underlying_id TEXT NOT NULL,
                ts INTEGER NOT NULL,
                seq INTEGER NOT NULL,
                source_ts INTEGER NOT NULL,
                ingest_ts INTEGER NOT NULL,
                trace_id TEXT NOT NULL,
                bid TEXT NOT NULL,
                ask TEXT NOT NULL,
                exchange TEXT NOT NULL,
                off_exchange_flag INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::InitError(e.to_string()))?;
        Ok(())
    }

    async fn insert(&self, quote: &Quote) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO equity_quotes
                (underlying_id, ts, seq, source_ts, ingest_ts, trace_id, bid, ask, exchange, off_exchange_flag)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&quote.underlying_id)
        .bind(quote.ts)
        .bind(quote.seq)
        .bind(quote.source_ts)
        .bind(quote.ingest_ts)
        .bind(&quote.trace_id)
        .bind(Self::decimal_to_text(quote.bid))
        .bind(Self::decimal_to_text(quote.ask))
        .bind(&quote.exchange)
        .bind(i32::from(quote.off_exchange_flag))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl CandleStore for SqliteEquityStore {
    async fn ensure_table(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS equity_candles (
                underlying_id TEXT NOT NULL,
                interval_ms INTEGER NOT NULL,
                ts INTEGER NOT NULL,
                open TEXT NOT NULL,
                high TEXT NOT NULL,
                low TEXT NOT NULL,
                close TEXT NOT NULL,
                volume INTEGER NOT NULL,
                trade_count INTEGER NOT NULL,
                source_ts INTEGER NOT NULL,
                ingest_ts INTEGER NOT NULL,
                seq INTEGER NOT NULL,
                trace_id TEXT NOT NULL,
                PRIMARY KEY (underlying_id, interval_ms, ts)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::InitError(e.to_string()))?;
        Ok(())
    }

    async fn insert(&self, candle: &Candle) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO equity_candles
                (underlying_id, interval_ms, ts, open, high, low, close, volume, trade_count, source_ts, ingest_ts, seq, trace_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&candle.underlying_id)
        .bind(candle.interval_ms)
        .bind(candle.ts)
        .bind(Self::decimal_to_text(candle.open))
        .bind(Self::decimal_to_text(candle.high))
        .bind(Self::decimal_to_text(candle.low))
        .bind(Self::decimal_to_text(candle.close))
        .bind(candle.volume)
        .bind(candle.trade_count)
        .bind(candle.source_ts)
        .bind(candle.ingest_ts)
        .bind(candle.seq)
        .bind(&candle.trace_id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }
}
