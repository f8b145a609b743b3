use super::error::CacheError;
use crate::entity::Candle;
use async_trait::async_trait;

/// Bounded time-sorted hot cache for recently emitted candles (§4.4, §6).
///
/// # Invariants
/// - One sorted set per `(underlying_id, interval_ms)`, scored by `candle.ts`.
/// - The cache is advisory: callers must tolerate absence or staleness, and a
///   failed update is warned/counted/ignored by the caller, never propagated
///   as a hard failure (§7 `CacheError`).
#[async_trait]
pub trait CandleCache: Send + Sync {
    /// Whether the underlying client currently has a live connection. When
    /// `false`, C4 skips the cache update for this candle entirely (§4.4).
    fn is_connected(&self) -> bool {
        true
    }

    /// Add `(score = candle.ts, value = candle)` to the sorted set for
    /// `(candle.underlying_id, candle.interval_ms)`, then trim every entry
    /// with `score <= candle.ts - interval_ms * cache_limit`. A `cache_limit`
    /// of zero disables the cache entirely (the call is a no-op).
    async fn update(&self, candle: &Candle, cache_limit: usize) -> Result<(), CacheError>;
}
