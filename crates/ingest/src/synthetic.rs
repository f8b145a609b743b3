//! Synthetic adapter: a self-contained venue source used for local demos and
//! tests. Periodically emits trade prints for a small fixed symbol set,
//! grounded on the polling-loop shape of a real venue feed adapter.

use equity_core::entity::Print;
use equity_core::ingest::port::{Adapter, AdapterStop, IngestHandlers};
use equity_core::time::TimeProvider;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

const SYMBOLS: &[&str] = &["AAPL", "MSFT", "GOOG"];

pub struct SyntheticAdapter {
    emit_interval_ms: i64,
    time: Arc<dyn TimeProvider>,
}

impl SyntheticAdapter {
    pub fn new(emit_interval_ms: i64, time: Arc<dyn TimeProvider>) -> Self {
        Self { emit_interval_ms, time }
    }
}

#[async_trait::async_trait]
impl Adapter for SyntheticAdapter {
    fn name(&self) -> &str {
        "synthetic"
    }

    async fn start(self: Arc<Self>, handlers: Arc<dyn IngestHandlers>) -> Box<dyn AdapterStop> {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let seq = Arc::new(AtomicI64::new(0));
        let period = std::time::Duration::from_millis(u64::try_from(self.emit_interval_ms.max(1)).unwrap_or(1));

        let task_stop = stop_flag.clone();
        let task_handlers = handlers.clone();
        let task_time = self.time.clone();
        let task_seq = seq.clone();

        let join = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                if task_stop.load(Ordering::SeqCst) {
                    return;
                }
                for (i, symbol) in SYMBOLS.iter().enumerate() {
                    if task_stop.load(Ordering::SeqCst) {
                        return;
                    }
                    let ts = task_time.now_millis();
                    let seq_val = task_seq.fetch_add(1, Ordering::SeqCst);
                    let wobble = Decimal::new(i64::try_from(i).unwrap_or(0), 1);
                    let print = Print {
                        underlying_id: (*symbol).to_string(),
                        ts,
                        seq: seq_val,
                        source_ts: ts,
                        ingest_ts: ts,
                        trace_id: format!("synthetic:{symbol}:{seq_val}"),
                        price: Decimal::new(100, 0) + wobble,
                        size: 100,
                        exchange: "N".to_string(),
                        off_exchange_flag: false,
                    };
                    debug!(symbol, ts, "synthetic print emitted");
                    task_handlers.on_trade(print);
                }
            }
        });

        Box::new(SyntheticAdapterStop { stop_flag, join: Some(join) })
    }
}

pub struct SyntheticAdapterStop {
    stop_flag: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

#[async_trait::async_trait]
impl AdapterStop for SyntheticAdapterStop {
    async fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }
}

impl Drop for SyntheticAdapterStop {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            join.abort();
        }
    }
}
