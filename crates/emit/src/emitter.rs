//! Candle emitter (C4, §4.4): fans each emitted candle out to the columnar
//! store, the bus, and the hot cache, with independent per-sink failure
//! handling. Store precedes bus precedes cache for any one candle (§5).

use equity_core::bus::entity::names;
use equity_core::bus::port::{BusClient, BusClientExt};
use equity_core::cache::port::CandleCache;
use equity_core::entity::{Candle, validate_candle};
use equity_core::store::port::CandleStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, warn};

/// Snapshot of the emitter's failure counters, for metrics/diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitterCounts {
    pub persist_failed: u64,
    pub publish_failed: u64,
    pub cache_failed: u64,
}

pub struct CandleEmitter {
    store: Arc<dyn CandleStore>,
    bus: Arc<dyn BusClient>,
    cache: Option<Arc<dyn CandleCache>>,
    cache_limit: usize,
    persist_failed: AtomicU64,
    publish_failed: AtomicU64,
    cache_failed: AtomicU64,
}

impl CandleEmitter {
    pub fn new(
        store: Arc<dyn CandleStore>,
        bus: Arc<dyn BusClient>,
        cache: Option<Arc<dyn CandleCache>>,
        cache_limit: usize,
    ) -> Self {
        Self {
            store,
            bus,
            cache,
            cache_limit,
            persist_failed: AtomicU64::new(0),
            publish_failed: AtomicU64::new(0),
            cache_failed: AtomicU64::new(0),
        }
    }

    pub fn counts(&self) -> EmitterCounts {
        EmitterCounts {
            persist_failed: self.persist_failed.load(Ordering::Relaxed),
            publish_failed: self.publish_failed.load(Ordering::Relaxed),
            cache_failed: self.cache_failed.load(Ordering::Relaxed),
        }
    }

    /// Emits a batch, e.g. the result of `CandleAggregator::drain`, in order.
    pub async fn emit_all(&self, candles: &[Candle]) {
        for candle in candles {
            self.emit(candle).await;
        }
    }

    /// Validates, then fans `candle` out to the three sinks per §4.4.
    pub async fn emit(&self, candle: &Candle) {
        if let Err(e) = validate_candle(candle) {
            warn!(error = %e, underlying_id = %candle.underlying_id, ts = candle.ts, "outbound candle failed validation, skipping all sinks");
            return;
        }

        if let Err(e) = self.store.insert(candle).await {
            self.persist_failed.fetch_add(1, Ordering::Relaxed);
            error!(error = %e, underlying_id = %candle.underlying_id, ts = candle.ts, "candle store insert failed, skipping bus and cache");
            return;
        }

        if let Err(e) = self.bus.publish_json(names::CANDLES_SUBJECT, candle).await {
            self.publish_failed.fetch_add(1, Ordering::Relaxed);
            error!(error = %e, underlying_id = %candle.underlying_id, ts = candle.ts, "candle publish failed, store insert stands");
        }

        if let Some(cache) = &self.cache {
            if !cache.is_connected() {
                return;
            }
            if let Err(e) = cache.update(candle, self.cache_limit).await {
                self.cache_failed.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, underlying_id = %candle.underlying_id, ts = candle.ts, "candle cache update failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use equity_core::bus::entity::{DeliverPolicy, StreamSpec};
    use equity_core::bus::error::BusError;
    use equity_core::bus::port::MessageStream;
    use equity_core::cache::error::CacheError;
    use equity_core::store::error::StoreError;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    struct MockStore {
        fail: bool,
        inserted: Mutex<Vec<Candle>>,
    }

    #[async_trait::async_trait]
    impl CandleStore for MockStore {
        async fn ensure_table(&self) -> Result<(), StoreError> {
            Ok(())
        }
        async fn insert(&self, candle: &Candle) -> Result<(), StoreError> {
            if self.fail {
                return Err(StoreError::Database("boom".to_string()));
            }
            self.inserted.lock().expect("lock").push(candle.clone());
            Ok(())
        }
    }

    struct MockBus {
        fail: bool,
        published: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl BusClient for MockBus {
        async fn ensure_stream(&self, _spec: &StreamSpec) -> Result<(), BusError> {
            Ok(())
        }
        async fn ensure_durable_consumer(
            &self,
            _stream: &str,
            _durable: &str,
            _deliver_policy: DeliverPolicy,
            _force_reset: bool,
        ) -> Result<(), BusError> {
            Ok(())
        }
        async fn publish_raw(&self, subject: &str, _payload: Vec<u8>) -> Result<(), BusError> {
            if self.fail {
                return Err(BusError::Publish("nope".to_string()));
            }
            self.published.lock().expect("lock").push(subject.to_string());
            Ok(())
        }
        async fn subscribe(&self, _stream: &str, _durable: &str) -> Result<MessageStream, BusError> {
            unimplemented!("not exercised by emitter tests")
        }
    }

    struct MockCache {
        fail: bool,
        connected: bool,
        updated: Mutex<usize>,
    }

    #[async_trait::async_trait]
    impl CandleCache for MockCache {
        fn is_connected(&self) -> bool {
            self.connected
        }
        async fn update(&self, _candle: &Candle, _cache_limit: usize) -> Result<(), CacheError> {
            if self.fail {
                return Err(CacheError::Storage("down".to_string()));
            }
            *self.updated.lock().expect("lock") += 1;
            Ok(())
        }
    }

    fn sample_candle() -> Candle {
        Candle {
            underlying_id: "AAPL".to_string(),
            interval_ms: 1000,
            ts: 1000,
            open: dec!(10),
            high: dec!(12),
            low: dec!(10),
            close: dec!(12),
            volume: 150,
            trade_count: 2,
            source_ts: 1000,
            ingest_ts: 1500,
            seq: 2,
            trace_id: "candle:AAPL:1000:1000".to_string(),
        }
    }

    #[tokio::test]
    async fn happy_path_reaches_all_three_sinks() {
        let store = Arc::new(MockStore { fail: false, inserted: Mutex::new(Vec::new()) });
        let bus = Arc::new(MockBus { fail: false, published: Mutex::new(Vec::new()) });
        let cache = Arc::new(MockCache { fail: false, connected: true, updated: Mutex::new(0) });
        let emitter = CandleEmitter::new(store.clone(), bus.clone(), Some(cache.clone()), 10);

        emitter.emit(&sample_candle()).await;

        assert_eq!(store.inserted.lock().expect("lock").len(), 1);
        assert_eq!(bus.published.lock().expect("lock").len(), 1);
        assert_eq!(*cache.updated.lock().expect("lock"), 1);
        assert_eq!(emitter.counts(), EmitterCounts::default());
    }

    #[tokio::test]
    async fn store_failure_skips_bus_and_cache() {
        let store = Arc::new(MockStore { fail: true, inserted: Mutex::new(Vec::new()) });
        let bus = Arc::new(MockBus { fail: false, published: Mutex::new(Vec::new()) });
        let cache = Arc::new(MockCache { fail: false, connected: true, updated: Mutex::new(0) });
        let emitter = CandleEmitter::new(store, bus.clone(), Some(cache.clone()), 10);

        emitter.emit(&sample_candle()).await;

        assert!(bus.published.lock().expect("lock").is_empty());
        assert_eq!(*cache.updated.lock().expect("lock"), 0);
        assert_eq!(emitter.counts().persist_failed, 1);
    }

    #[tokio::test]
    async fn bus_failure_does_not_roll_back_store_and_cache_still_runs() {
        let store = Arc::new(MockStore { fail: false, inserted: Mutex::new(Vec::new()) });
        let bus = Arc::new(MockBus { fail: true, published: Mutex::new(Vec::new()) });
        let cache = Arc::new(MockCache { fail: false, connected: true, updated: Mutex::new(0) });
        let emitter = CandleEmitter::new(store.clone(), bus, Some(cache.clone()), 10);

        emitter.emit(&sample_candle()).await;

        assert_eq!(store.inserted.lock().expect("lock").len(), 1);
        assert_eq!(*cache.updated.lock().expect("lock"), 1);
        assert_eq!(emitter.counts().publish_failed, 1);
    }

    #[tokio::test]
    async fn cache_failure_is_only_warned() {
        let store = Arc::new(MockStore { fail: false, inserted: Mutex::new(Vec::new()) });
        let bus = Arc::new(MockBus { fail: false, published: Mutex::new(Vec::new()) });
        let cache = Arc::new(MockCache { fail: true, connected: true, updated: Mutex::new(0) });
        let emitter = CandleEmitter::new(store.clone(), bus.clone(), Some(cache), 10);

        emitter.emit(&sample_candle()).await;

        assert_eq!(store.inserted.lock().expect("lock").len(), 1);
        assert_eq!(bus.published.lock().expect("lock").len(), 1);
        assert_eq!(emitter.counts().cache_failed, 1);
    }

    #[tokio::test]
    async fn invalid_outbound_candle_skips_every_sink() {
        let store = Arc::new(MockStore { fail: false, inserted: Mutex::new(Vec::new()) });
        let bus = Arc::new(MockBus { fail: false, published: Mutex::new(Vec::new()) });
        let emitter = CandleEmitter::new(store.clone(), bus.clone(), None, 10);

        let mut candle = sample_candle();
        candle.low = dec!(11);
        emitter.emit(&candle).await;

        assert!(store.inserted.lock().expect("lock").is_empty());
        assert!(bus.published.lock().expect("lock").is_empty());
        assert_eq!(emitter.counts(), EmitterCounts::default());
    }

    #[tokio::test]
    async fn disconnected_cache_is_skipped_without_counting_a_failure() {
        let store = Arc::new(MockStore { fail: false, inserted: Mutex::new(Vec::new()) });
        let bus = Arc::new(MockBus { fail: false, published: Mutex::new(Vec::new()) });
        let cache = Arc::new(MockCache { fail: true, connected: false, updated: Mutex::new(0) });
        let emitter = CandleEmitter::new(store, bus, Some(cache), 10);

        emitter.emit(&sample_candle()).await;

        assert_eq!(emitter.counts().cache_failed, 0);
    }
}
