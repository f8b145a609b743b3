mod pipeline;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use equity_aggregator::CandleAggregator;
use equity_bus::NatsBusClient;
use equity_cache::InMemoryCandleCache;
use equity_core::bus::entity::DeliverPolicy;
use equity_core::bus::port::BusClient;
use equity_core::cache::port::CandleCache;
use equity_core::config::AppConfig;
use equity_core::ingest::port::Adapter;
use equity_core::store::port::{CandleStore, PrintStore, QuoteStore};
use equity_core::time::RealTimeProvider;
use equity_emit::CandleEmitter;
use equity_ingest::{IngestPublisher, SyntheticAdapter, ThrottleGate};
use equity_store::SqliteEquityStore;
use pipeline::Pipeline;
use rust_decimal_macros::dec;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Bounded total time budget for the shutdown sequence (§5).
const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(10);

/// Connection retry knobs for the bus (§4.1, §9 ambient-stack retry style).
const BUS_CONNECT_ATTEMPTS: u32 = 5;
const BUS_CONNECT_DELAY: Duration = Duration::from_millis(500);

/// Minimum NBBO tick size used to validate quotes (§3); not an enumerated
/// config key, so it is a fixed constant here rather than threaded through
/// `AppConfig`.
fn min_tick() -> rust_decimal::Decimal {
    dec!(0.01)
}

/// # Summary
/// Process entry point, a pure DI container: wires C1-C4 from their concrete
/// implementations and runs until a shutdown signal arrives.
///
/// # Logic
/// 1. Initialize dual console + rolling-file logging.
/// 2. Load layered configuration (file, then `EQUITY_` env vars, then
///    built-in defaults).
/// 3. Connect to the bus and ensure the three streams exist.
/// 4. Instantiate the columnar store and hot cache.
/// 5. Instantiate the aggregator (C3) and emitter (C4), and start the
///    durable consumer loop that folds prints into candles.
/// 6. Instantiate the ingest publisher (C2) and start the adapter.
/// 7. Wait for SIGINT/SIGTERM, then run the bounded shutdown sequence.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let app_config = load_config()?;
    info!(?app_config, "configuration loaded");

    let bus: Arc<dyn BusClient> = Arc::new(
        NatsBusClient::connect(&app_config.bus.servers, BUS_CONNECT_ATTEMPTS, BUS_CONNECT_DELAY)
            .await?,
    );
    Pipeline::ensure_streams(bus.as_ref()).await?;

    let store = Arc::new(SqliteEquityStore::connect(resolve_store_path(&app_config)).await?);
    PrintStore::ensure_table(store.as_ref()).await?;
    QuoteStore::ensure_table(store.as_ref()).await?;
    CandleStore::ensure_table(store.as_ref()).await?;

    // No registry-available Redis crate is used anywhere in this codebase's
    // lineage (see DESIGN.md); an in-memory cache fulfils the same port.
    let cache: Arc<dyn CandleCache> = Arc::new(InMemoryCandleCache::new());

    let aggregator = Arc::new(Mutex::new(CandleAggregator::new(
        app_config.candle.intervals_ms.clone(),
        app_config.candle.max_late_ms,
    )));
    let emitter = Arc::new(CandleEmitter::new(
        store.clone(),
        bus.clone(),
        Some(cache),
        app_config.candle.cache_limit,
    ));

    let deliver_policy = DeliverPolicy::from_str(&app_config.candle.deliver_policy).unwrap_or_else(|e| {
        warn!(error = %e, "unrecognised deliver policy, defaulting to new");
        DeliverPolicy::New
    });
    let consumer_task = Pipeline::start_consumer(
        bus.clone(),
        aggregator.clone(),
        emitter.clone(),
        deliver_policy,
        app_config.candle.consumer_reset,
    )
    .await?;

    let time = Arc::new(RealTimeProvider);
    let trade_gate = ThrottleGate::new(
        time.clone(),
        app_config.ingest.testing_mode,
        app_config.ingest.testing_throttle_ms,
        "trade",
    );
    let quote_gate = ThrottleGate::new(
        time.clone(),
        app_config.ingest.testing_mode,
        app_config.ingest.testing_throttle_ms,
        "quote",
    );
    let publisher = Arc::new(IngestPublisher::new(
        store.clone(),
        store.clone(),
        bus.clone(),
        trade_gate,
        quote_gate,
        min_tick(),
    ));

    if app_config.ingest.adapter_name != "synthetic" {
        warn!(
            adapter = %app_config.ingest.adapter_name,
            "only the in-process synthetic adapter is wired; the venue adapter is an external collaborator per spec §1"
        );
    }
    let adapter = Arc::new(SyntheticAdapter::new(app_config.ingest.emit_interval_ms, time));
    let adapter_stop = adapter.clone().start(publisher.clone()).await;

    let pipeline = Pipeline {
        bus: bus.clone(),
        store: store.clone(),
        publisher,
        adapter_stop: Mutex::new(Some(adapter_stop)),
        consumer_task: Mutex::new(Some(consumer_task)),
    };

    info!("equity pipeline running, waiting for shutdown signal");
    wait_for_shutdown_signal().await;
    info!("shutdown signal received, draining");

    pipeline.shutdown(aggregator, emitter, SHUTDOWN_DEADLINE).await;
    info!("shutdown complete, exiting");

    Ok(())
}

fn init_logging() {
    let file_appender = tracing_appender::rolling::daily("logs", "equity-pipeline.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    // Leaked deliberately: the guard must outlive `main`, and this process
    // has exactly one logging subscriber for its whole lifetime.
    Box::leak(Box::new(guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(non_blocking)
        .init();
}

fn load_config() -> anyhow::Result<AppConfig> {
    let config_path = std::path::Path::new("config.toml");
    let legacy_path = std::path::Path::new("config");

    let mut builder = config::Config::builder();
    if config_path.exists() {
        builder = builder.add_source(config::File::from(config_path).required(true));
    } else if legacy_path.exists() {
        builder = builder.add_source(config::File::with_name("config").required(true));
    }
    builder = builder.add_source(config::Environment::with_prefix("EQUITY").separator("__"));

    let built = builder.build()?;
    if config_path.exists() || legacy_path.exists() {
        Ok(built.try_deserialize()?)
    } else {
        // `config::Environment` always "succeeds" even with zero variables
        // set, so fall back to the documented defaults unless it actually
        // picked something up.
        match built.try_deserialize::<AppConfig>() {
            Ok(cfg) => Ok(cfg),
            Err(_) => Ok(AppConfig::default()),
        }
    }
}

/// `http(s)://` store URLs (the table's documented default) don't name a
/// filesystem path; fall back to a local file keyed by the logical database
/// name instead of failing to start. A `sqlite:`/plain-path URL is used
/// as-is.
fn resolve_store_path(config: &AppConfig) -> String {
    if config.store.url.starts_with("http://") || config.store.url.starts_with("https://") {
        format!("{}.sqlite3", config.store.database)
    } else {
        config.store.url.clone()
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler, falling back to ctrl_c only");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
