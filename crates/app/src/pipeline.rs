//! Wires C1-C4 together into a single runnable process and owns the
//! shutdown sequence from §5: stop new arrivals, drain the aggregator,
//! close the cache, drain the bus, close the store.

use std::sync::Arc;
use std::time::Duration;

use equity_aggregator::CandleAggregator;
use equity_core::bus::entity::{names, DeliverPolicy, StreamSpec};
use equity_core::bus::port::{decode_json, BusClient};
use equity_core::entity::Print;
use equity_core::ingest::port::AdapterStop;
use equity_emit::CandleEmitter;
use equity_ingest::IngestPublisher;
use equity_store::SqliteEquityStore;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const PRINTS_DURABLE: &str = "equity-candle-aggregator";

/// Bundles every long-lived handle the running pipeline needs to shut down
/// cleanly, in the order §5 requires.
pub struct Pipeline {
    pub bus: Arc<dyn BusClient>,
    pub store: Arc<SqliteEquityStore>,
    pub publisher: Arc<IngestPublisher>,
    pub adapter_stop: Mutex<Option<Box<dyn AdapterStop>>>,
    pub consumer_task: Mutex<Option<JoinHandle<()>>>,
}

impl Pipeline {
    /// Bootstraps the durable consumer for the print stream (§4.1) and
    /// starts the consumer loop that folds prints into candles and fans
    /// emitted candles out through `emitter`.
    pub async fn start_consumer(
        bus: Arc<dyn BusClient>,
        aggregator: Arc<Mutex<CandleAggregator>>,
        emitter: Arc<CandleEmitter>,
        deliver_policy: DeliverPolicy,
        force_reset: bool,
    ) -> anyhow::Result<JoinHandle<()>> {
        bus.ensure_durable_consumer(
            names::PRINTS_STREAM,
            PRINTS_DURABLE,
            deliver_policy,
            force_reset,
        )
        .await?;

        let mut messages = bus.subscribe(names::PRINTS_STREAM, PRINTS_DURABLE).await?;

        let handle = tokio::spawn(async move {
            while let Some(message) = messages.next().await {
                let print: Print = match decode_json(message.as_ref()) {
                    Ok(print) => print,
                    Err(e) => {
                        warn!(error = %e, "malformed print on bus, terminating message");
                        if let Err(term_err) = message.term().await {
                            error!(error = %term_err, "failed to term malformed print message");
                        }
                        continue;
                    }
                };

                let outcome = aggregator.lock().await.ingest(&print);
                if outcome.dropped_late > 0 {
                    debug!(
                        underlying_id = %print.underlying_id,
                        dropped_late = outcome.dropped_late,
                        "late prints dropped"
                    );
                }
                emitter.emit_all(&outcome.emitted).await;

                if let Err(e) = message.ack().await {
                    error!(error = %e, "failed to ack processed print message");
                }
            }
            info!("print consumer stream ended");
        });

        Ok(handle)
    }

    /// Idempotently declares the three streams this pipeline depends on (§6).
    pub async fn ensure_streams(bus: &dyn BusClient) -> anyhow::Result<()> {
        bus.ensure_stream(&StreamSpec::new(
            names::PRINTS_STREAM,
            vec![names::PRINTS_SUBJECT.to_string()],
        ))
        .await?;
        bus.ensure_stream(&StreamSpec::new(
            names::QUOTES_STREAM,
            vec![names::QUOTES_SUBJECT.to_string()],
        ))
        .await?;
        bus.ensure_stream(&StreamSpec::new(
            names::CANDLES_STREAM,
            vec![names::CANDLES_SUBJECT.to_string()],
        ))
        .await?;
        Ok(())
    }

    /// Runs the seven-step shutdown sequence from §5, bounded by `deadline`.
    /// A timed-out stage is logged and skipped rather than allowed to hang
    /// the process past the budget.
    pub async fn shutdown(
        &self,
        aggregator: Arc<Mutex<CandleAggregator>>,
        emitter: Arc<CandleEmitter>,
        deadline: Duration,
    ) {
        let run = async {
            // 1. stop accepting new ingest events.
            self.publisher.shut_down();

            // 2. stop the adapter and the bus consumer, ceasing new arrivals.
            if let Some(stop) = self.adapter_stop.lock().await.take() {
                stop.stop().await;
            }
            if let Some(task) = self.consumer_task.lock().await.take() {
                task.abort();
            }

            // 3. drain every open window and push the remainder through C4.
            let drained = aggregator.lock().await.drain();
            info!(count = drained.len(), "draining remaining candles on shutdown");
            emitter.emit_all(&drained).await;

            // 4. close the cache client (in-memory cache: nothing to flush).

            // 5. drain the bus connection, flushing outbound publishes.
            if let Err(e) = self.bus.close().await {
                warn!(error = %e, "bus drain failed during shutdown");
            }

            // 6. close the store client.
            self.store.close().await;
        };

        if tokio::time::timeout(deadline, run).await.is_err() {
            warn!(?deadline, "shutdown sequence exceeded its deadline, forcing exit");
        }

        // 7. exit is left to the caller (`main`), which returns after this.
    }
}
