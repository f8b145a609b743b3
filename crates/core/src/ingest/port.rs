use crate::entity::{Print, Quote};
use async_trait::async_trait;
use std::sync::Arc;

/// Callbacks the adapter invokes for each observed event (§4.2).
///
/// `on_quote` is optional in the original contract; the default no-op lets an
/// adapter-facing implementation ignore quotes entirely.
pub trait IngestHandlers: Send + Sync {
    fn on_trade(&self, print: Print);

    fn on_quote(&self, _quote: Quote) {}
}

/// A pluggable venue source. `start` must not block; it spawns whatever
/// background work is needed and returns a stop handle.
///
/// # Invariants
/// - `stop()` is idempotent and ceases invoking `handlers` before it returns.
#[async_trait]
pub trait Adapter: Send + Sync {
    fn name(&self) -> &str;

    async fn start(self: Arc<Self>, handlers: Arc<dyn IngestHandlers>) -> Box<dyn AdapterStop>;
}

/// Handle returned by [`Adapter::start`]. Dropping it does **not** stop the
/// adapter; callers must invoke `stop()` explicitly.
#[async_trait]
pub trait AdapterStop: Send + Sync {
    async fn stop(&self);
}
