//! In-memory hot cache: a `DashMap` of per-key sorted sets, mirroring the
//! `(symbol, interval_ms)` keying scheme of the abstract cache contract (§6).
//! A real deployment swaps this for a Redis client behind the same
//! [`CandleCache`] port; this implementation exists so the pipeline is
//! runnable and testable without an external cache product.

use dashmap::DashMap;
use equity_core::cache::error::CacheError;
use equity_core::cache::port::CandleCache;
use equity_core::entity::Candle;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Builds the `candles:equity:{interval_ms}:{underlying_id}` key from §6.
pub fn cache_key(underlying_id: &str, interval_ms: i64) -> String {
    format!("candles:equity:{interval_ms}:{underlying_id}")
}

/// `DashMap<key, sorted-by-score(ts) candle JSON>` cache.
pub struct InMemoryCandleCache {
    sets: DashMap<String, Mutex<BTreeMap<i64, String>>>,
}

impl InMemoryCandleCache {
    pub fn new() -> Self {
        Self {
            sets: DashMap::new(),
        }
    }

    /// Number of entries currently retained for a key (test/diagnostic use).
    pub fn len(&self, underlying_id: &str, interval_ms: i64) -> usize {
        self.sets
            .get(&cache_key(underlying_id, interval_ms))
            .map(|set| set.lock().map(|g| g.len()).unwrap_or(0))
            .unwrap_or(0)
    }
}

impl Default for InMemoryCandleCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CandleCache for InMemoryCandleCache {
    async fn update(&self, candle: &Candle, cache_limit: usize) -> Result<(), CacheError> {
        if cache_limit == 0 {
            return Ok(());
        }

        let value = serde_json::to_string(candle).map_err(|e| CacheError::Serialize(e.to_string()))?;
        let key = cache_key(&candle.underlying_id, candle.interval_ms);
        let set = self.sets.entry(key).or_insert_with(|| Mutex::new(BTreeMap::new()));
        let mut set = set
            .lock()
            .map_err(|_| CacheError::Storage("cache lock poisoned".to_string()))?;

        set.insert(candle.ts, value);

        let cache_limit = i64::try_from(cache_limit).unwrap_or(i64::MAX);
        let floor = candle.ts - candle.interval_ms * cache_limit;
        set.retain(|score, _| *score > floor);

        Ok(())
    }
}
