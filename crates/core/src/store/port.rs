use super::error::StoreError;
use crate::entity::{Candle, Print, Quote};
use async_trait::async_trait;

/// Append-only store for the `equity_prints` table.
///
/// # Invariants
/// - `ensure_table` is idempotent and safe to call on every startup.
#[async_trait]
pub trait PrintStore: Send + Sync {
    async fn ensure_table(&self) -> Result<(), StoreError>;
    async fn insert(&self, print: &Print) -> Result<(), StoreError>;
}

/// Append-only store for the `equity_quotes` table.
#[async_trait]
pub trait QuoteStore: Send + Sync {
    async fn ensure_table(&self) -> Result<(), StoreError>;
    async fn insert(&self, quote: &Quote) -> Result<(), StoreError>;
}

/// Append-only store for the `equity_candles` table, conceptually keyed by
/// `(underlying_id, interval_ms, ts)`.
#[async_trait]
pub trait CandleStore: Send + Sync {
    async fn ensure_table(&self) -> Result<(), StoreError>;
    async fn insert(&self, candle: &Candle) -> Result<(), StoreError>;
}
