//! Ingest publisher (C2): validates, write-throughs to the store, then
//! publishes onto the bus, in that order (§4.2). A store failure skips the
//! publish; a publish failure is logged but never rolls back the insert.

use crate::throttle::ThrottleGate;
use equity_core::bus::entity::names;
use equity_core::bus::port::{BusClient, BusClientExt};
use equity_core::entity::{Print, Quote, validate_print, validate_quote};
use equity_core::ingest::port::IngestHandlers;
use equity_core::store::port::{PrintStore, QuoteStore};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

pub struct IngestPublisher {
    print_store: Arc<dyn PrintStore>,
    quote_store: Arc<dyn QuoteStore>,
    bus: Arc<dyn BusClient>,
    trade_gate: ThrottleGate,
    quote_gate: ThrottleGate,
    min_tick: Decimal,
    shutting_down: Arc<AtomicBool>,
}

impl IngestPublisher {
    pub fn new(
        print_store: Arc<dyn PrintStore>,
        quote_store: Arc<dyn QuoteStore>,
        bus: Arc<dyn BusClient>,
        trade_gate: ThrottleGate,
        quote_gate: ThrottleGate,
        min_tick: Decimal,
    ) -> Self {
        Self {
            print_store,
            quote_store,
            bus,
            trade_gate,
            quote_gate,
            min_tick,
            shutting_down: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stops accepting new events. In-flight spawned tasks still complete.
    pub fn shut_down(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    async fn handle_trade(print_store: Arc<dyn PrintStore>, bus: Arc<dyn BusClient>, print: Print) {
        if let Err(e) = validate_print(&print) {
            warn!(error = %e, underlying_id = %print.underlying_id, "dropping invalid print");
            return;
        }
        if let Err(e) = print_store.insert(&print).await {
            error!(error = %e, underlying_id = %print.underlying_id, "print store insert failed, skipping publish");
            return;
        }
        if let Err(e) = bus.publish_json(names::PRINTS_SUBJECT, &print).await {
            error!(error = %e, underlying_id = %print.underlying_id, "print publish failed");
        } else {
            debug!(underlying_id = %print.underlying_id, ts = print.ts, "print published");
        }
    }

    async fn handle_quote(
        quote_store: Arc<dyn QuoteStore>,
        bus: Arc<dyn BusClient>,
        quote: Quote,
        min_tick: Decimal,
    ) {
        if let Err(e) = validate_quote(&quote, min_tick) {
            warn!(error = %e, underlying_id = %quote.underlying_id, "dropping invalid quote");
            return;
        }
        if let Err(e) = quote_store.insert(&quote).await {
            error!(error = %e, underlying_id = %quote.underlying_id, "quote store insert failed, skipping publish");
            return;
        }
        if let Err(e) = bus.publish_json(names::QUOTES_SUBJECT, &quote).await {
            error!(error = %e, underlying_id = %quote.underlying_id, "quote publish failed");
        }
    }
}

impl IngestHandlers for IngestPublisher {
    fn on_trade(&self, print: Print) {
        if self.shutting_down.load(Ordering::SeqCst) {
            return;
        }
        if !self.trade_gate.admit() {
            return;
        }
        let print_store = self.print_store.clone();
        let bus = self.bus.clone();
        tokio::spawn(Self::handle_trade(print_store, bus, print));
    }

    fn on_quote(&self, quote: Quote) {
        if self.shutting_down.load(Ordering::SeqCst) {
            return;
        }
        if !self.quote_gate.admit() {
            return;
        }
        let quote_store = self.quote_store.clone();
        let bus = self.bus.clone();
        let min_tick = self.min_tick;
        tokio::spawn(Self::handle_quote(quote_store, bus, quote, min_tick));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use equity_core::bus::error::BusError;
    use equity_core::bus::entity::{DeliverPolicy, StreamSpec};
    use equity_core::bus::port::MessageStream;
    use equity_core::store::error::StoreError;
    use equity_core::time::{FakeClockProvider, TimeProvider};
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPrintStore {
        inserted: Mutex<Vec<Print>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl PrintStore for RecordingPrintStore {
        async fn ensure_table(&self) -> Result<(), StoreError> {
            Ok(())
        }
        async fn insert(&self, print: &Print) -> Result<(), StoreError> {
            if self.fail {
                return Err(StoreError::Database("boom".to_string()));
            }
            self.inserted.lock().expect("lock").push(print.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct NoopQuoteStore;

    #[async_trait::async_trait]
    impl QuoteStore for NoopQuoteStore {
        async fn ensure_table(&self) -> Result<(), StoreError> {
            Ok(())
        }
        async fn insert(&self, _quote: &Quote) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingBus {
        published: Mutex<Vec<(String, Vec<u8>)>>,
    }

    #[async_trait::async_trait]
    impl BusClient for RecordingBus {
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
        async fn publish_raw(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError> {
            self.published.lock().expect("lock").push((subject.to_string(), payload));
            Ok(())
        }
        async fn subscribe(&self, _stream: &str, _durable: &str) -> Result<MessageStream, BusError> {
            unimplemented!("not exercised by publisher tests")
        }
    }

    fn sample_print() -> Print {
        Print {
            underlying_id: "AAPL".to_string(),
            ts: 1000,
            seq: 1,
            source_ts: 1000,
            ingest_ts: 1000,
            trace_id: "t".to_string(),
            price: dec!(10),
            size: 100,
            exchange: "N".to_string(),
            off_exchange_flag: false,
        }
    }

    fn gate() -> ThrottleGate {
        let time: Arc<dyn TimeProvider> = Arc::new(FakeClockProvider::new(chrono::Utc::now()));
        ThrottleGate::new(time, false, 0, "trade")
    }

    #[tokio::test]
    async fn valid_print_reaches_store_then_bus() {
        let store = Arc::new(RecordingPrintStore::default());
        let bus = Arc::new(RecordingBus::default());
        IngestPublisher::handle_trade(store.clone(), bus.clone(), sample_print()).await;

        assert_eq!(store.inserted.lock().expect("lock").len(), 1);
        assert_eq!(bus.published.lock().expect("lock").len(), 1);
        assert_eq!(bus.published.lock().expect("lock")[0].0, "equity.prints");
    }

    #[tokio::test]
    async fn store_failure_skips_publish() {
        let store = Arc::new(RecordingPrintStore {
            inserted: Mutex::new(Vec::new()),
            fail: true,
        });
        let bus = Arc::new(RecordingBus::default());
        IngestPublisher::handle_trade(store, bus.clone(), sample_print()).await;

        assert!(bus.published.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn invalid_print_is_dropped_before_store() {
        let store = Arc::new(RecordingPrintStore::default());
        let bus = Arc::new(RecordingBus::default());
        let mut print = sample_print();
        print.price = dec!(-1);
        IngestPublisher::handle_trade(store.clone(), bus, print).await;

        assert!(store.inserted.lock().expect("lock").is_empty());
    }

    #[test]
    fn publisher_builds_with_gates() {
        let print_store: Arc<dyn PrintStore> = Arc::new(RecordingPrintStore::default());
        let quote_store: Arc<dyn QuoteStore> = Arc::new(NoopQuoteStore);
        let bus: Arc<dyn BusClient> = Arc::new(RecordingBus::default());
        let publisher = IngestPublisher::new(print_store, quote_store, bus, gate(), gate(), dec!(0.01));
        publisher.shut_down();
    }
}
