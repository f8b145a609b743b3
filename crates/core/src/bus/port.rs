use super::entity::{DeliverPolicy, StreamSpec};
use super::error::BusError;
use async_trait::async_trait;
use futures::Stream;
use serde::Serialize;
use std::pin::Pin;

/// A single message pulled off a durable consumer.
///
/// # Invariants
/// - The iterator/stream that produced this message advances only after
///   `ack()` or `term()` resolves (§5 backpressure).
#[async_trait]
pub trait BusMessage: Send + Sync {
    fn payload(&self) -> &[u8];
    fn subject(&self) -> &str;

    /// Acknowledge successful processing.
    async fn ack(&self) -> Result<(), BusError>;

    /// Permanently discard; the bus will never redeliver this message.
    async fn term(&self) -> Result<(), BusError>;
}

/// Stream of pulled messages, each carrying its own ack/term.
pub type MessageStream = Pin<Box<dyn Stream<Item = Box<dyn BusMessage>> + Send>>;

/// Durable stream client contract (C1, §4.1).
///
/// # Invariants
/// - `ensure_stream` is idempotent: it creates the stream only if absent and
///   propagates every error except "not found" from the lookup.
/// - `ensure_durable_consumer` never mutates an existing durable's config in
///   place; it deletes and recreates when desired and observed policy
///   disagree (§9 design notes).
#[async_trait]
pub trait BusClient: Send + Sync {
    /// Idempotently ensure a named stream exists with the given subjects.
    async fn ensure_stream(&self, spec: &StreamSpec) -> Result<(), BusError>;

    /// Bootstrap protocol from §4.1: reconcile the durable consumer's
    /// delivery policy against `deliver_policy`, optionally forcing a reset.
    async fn ensure_durable_consumer(
        &self,
        stream: &str,
        durable: &str,
        deliver_policy: DeliverPolicy,
        force_reset: bool,
    ) -> Result<(), BusError>;

    /// Publish raw bytes to `subject` with a synchronous ack.
    async fn publish_raw(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError>;

    /// Pull-subscribe to `durable` on `stream`. Retries the consumer-mismatch
    /// reset exactly once per §4.1 step 4.
    async fn subscribe(&self, stream: &str, durable: &str) -> Result<MessageStream, BusError>;

    /// Flushes any outbound publishes and closes the underlying connection.
    /// Part of the shutdown sequence (§5 step 5); a no-op by default for
    /// clients with nothing to flush.
    async fn close(&self) -> Result<(), BusError> {
        Ok(())
    }
}

/// Generic JSON convenience layer over [`BusClient`], kept as an extension
/// trait so `BusClient` itself stays object-safe.
#[async_trait]
pub trait BusClientExt: BusClient {
    async fn publish_json<T: Serialize + Sync>(
        &self,
        subject: &str,
        payload: &T,
    ) -> Result<(), BusError> {
        let bytes = serde_json::to_vec(payload).map_err(|e| BusError::Publish(e.to_string()))?;
        self.publish_raw(subject, bytes).await
    }
}

impl<T: BusClient + ?Sized> BusClientExt for T {}

/// Decode a message payload as JSON, surfacing a poison-pill marker the
/// caller should `term()` on failure rather than retry (§7 ValidationError,
/// inbound case).
pub fn decode_json<T: serde::de::DeserializeOwned>(
    message: &dyn BusMessage,
) -> Result<T, serde_json::Error> {
    serde_json::from_slice(message.payload())
}
