//! NATS JetStream implementation of the durable stream client (C1, spec §4.1).

use async_nats::jetstream::{
    self,
    consumer::{AckPolicy, DeliverPolicy as NatsDeliverPolicy, pull::Config as PullConsumerConfig},
    stream::{Config as StreamConfig, DiscardPolicy, RetentionPolicy, StorageType},
    AckKind, Context as JetStreamContext,
};
use async_trait::async_trait;
use equity_core::bus::entity::{DeliverPolicy, StreamSpec};
use equity_core::bus::error::BusError;
use equity_core::bus::port::{BusClient, BusMessage, MessageStream};
use futures::StreamExt;
use std::time::Duration;
use tracing::{debug, info, warn};

fn to_nats_policy(policy: DeliverPolicy) -> NatsDeliverPolicy {
    match policy {
        DeliverPolicy::New => NatsDeliverPolicy::New,
        DeliverPolicy::All => NatsDeliverPolicy::All,
        DeliverPolicy::Last => NatsDeliverPolicy::Last,
        DeliverPolicy::LastPerSubject => NatsDeliverPolicy::LastPerSubject,
    }
}

/// Durable stream client backed by NATS JetStream.
///
/// # Invariants
/// - Never mutates an existing durable consumer's config in place; reconciles
///   by delete-then-recreate (§9 design notes).
pub struct NatsBusClient {
    client: async_nats::Client,
    jetstream: JetStreamContext,
}

impl NatsBusClient {
    /// Connects with bounded retry (`attempts` x fixed `delay`), per §4.1.
    pub async fn connect(
        servers: &str,
        attempts: u32,
        delay: Duration,
    ) -> Result<Self, BusError> {
        let mut last_err = None;
        for attempt in 1..=attempts.max(1) {
            match async_nats::connect(servers).await {
                Ok(client) => {
                    info!(servers, attempt, "connected to bus");
                    return Ok(Self {
                        jetstream: jetstream::new(client.clone()),
                        client,
                    });
                }
                Err(e) => {
                    warn!(servers, attempt, error = %e, "bus connect attempt failed");
                    last_err = Some(e.to_string());
                    tokio::time::sleep(delay).await;
                }
            }
        }
        Err(BusError::TransientConnect(last_err.unwrap_or_else(|| {
            "no connection attempts were made".to_string()
        })))
    }

    /// Reconciliation step of the bootstrap protocol (§4.1 steps 1-3).
    async fn reconcile_consumer(
        &self,
        stream: &jetstream::stream::Stream,
        stream_name: &str,
        durable: &str,
        deliver_policy: DeliverPolicy,
        force_reset: bool,
    ) -> Result<(), BusError> {
        if force_reset {
            delete_ignoring_not_found(stream, durable).await?;
        } else if let Ok(mut existing) = stream.get_consumer::<PullConsumerConfig>(durable).await {
            let info = existing
                .info()
                .await
                .map_err(|e| BusError::Admin(e.to_string()))?;
            if info.config.deliver_policy != to_nats_policy(deliver_policy) {
                debug!(stream = stream_name, durable, "deliver policy differs, resetting");
                delete_ignoring_not_found(stream, durable).await?;
            } else {
                return Ok(());
            }
        }

        let config = PullConsumerConfig {
            durable_name: Some(durable.to_string()),
            ack_policy: AckPolicy::Explicit,
            deliver_policy: to_nats_policy(deliver_policy),
            ..Default::default()
        };
        stream
            .create_consumer(config)
            .await
            .map_err(|e| BusError::Admin(e.to_string()))?;
        info!(stream = stream_name, durable, "durable consumer created");
        Ok(())
    }
}

async fn delete_ignoring_not_found(
    stream: &jetstream::stream::Stream,
    durable: &str,
) -> Result<(), BusError> {
    match stream.delete_consumer(durable).await {
        Ok(_) => Ok(()),
        Err(e) if BusError::is_not_found(&e.to_string()) => Ok(()),
        Err(e) => Err(BusError::Admin(e.to_string())),
    }
}

#[async_trait]
impl BusClient for NatsBusClient {
    async fn ensure_stream(&self, spec: &StreamSpec) -> Result<(), BusError> {
        match self.jetstream.get_stream(&spec.name).await {
            Ok(_) => Ok(()),
            Err(e) if BusError::is_not_found(&e.to_string()) => {
                let config = StreamConfig {
                    name: spec.name.clone(),
                    subjects: spec.subjects.clone(),
                    retention: RetentionPolicy::Limits,
                    storage: StorageType::File,
                    discard: DiscardPolicy::Old,
                    max_messages: -1,
                    max_bytes: -1,
                    max_age: Duration::ZERO,
                    num_replicas: 1,
                    ..Default::default()
                };
                self.jetstream
                    .create_stream(config)
                    .await
                    .map_err(|e| BusError::Admin(e.to_string()))?;
                info!(stream = spec.name, "stream created");
                Ok(())
            }
            Err(e) => Err(BusError::Admin(e.to_string())),
        }
    }

    async fn ensure_durable_consumer(
        &self,
        stream: &str,
        durable: &str,
        deliver_policy: DeliverPolicy,
        force_reset: bool,
    ) -> Result<(), BusError> {
        let stream_handle = self
            .jetstream
            .get_stream(stream)
            .await
            .map_err(|e| BusError::Admin(e.to_string()))?;
        self.reconcile_consumer(&stream_handle, stream, durable, deliver_policy, force_reset)
            .await
    }

    async fn publish_raw(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError> {
        let ack = self
            .jetstream
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|e| BusError::Publish(e.to_string()))?;
        ack.await.map_err(|e| BusError::Publish(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> Result<(), BusError> {
        self.client
            .drain()
            .await
            .map_err(|e| BusError::Admin(e.to_string()))
    }

    async fn subscribe(&self, stream: &str, durable: &str) -> Result<MessageStream, BusError> {
        match self.subscribe_once(stream, durable).await {
            Ok(s) => Ok(s),
            Err(e) if matches!(&e, BusError::ConsumerMismatch(_)) => {
                let stream_handle = self
                    .jetstream
                    .get_stream(stream)
                    .await
                    .map_err(|e| BusError::Admin(e.to_string()))?;
                delete_ignoring_not_found(&stream_handle, durable).await?;
                self.subscribe_once(stream, durable).await
            }
            Err(e) => Err(e),
        }
    }
}

impl NatsBusClient {
    async fn subscribe_once(&self, stream: &str, durable: &str) -> Result<MessageStream, BusError> {
        let stream_handle = self
            .jetstream
            .get_stream(stream)
            .await
            .map_err(|e| BusError::Admin(e.to_string()))?;
        let consumer = stream_handle
            .get_consumer::<PullConsumerConfig>(durable)
            .await
            .map_err(|e| {
                let msg = e.to_string();
                if BusError::is_consumer_mismatch(&msg) {
                    BusError::ConsumerMismatch(msg)
                } else {
                    BusError::Admin(msg)
                }
            })?;

        let messages = consumer
            .messages()
            .await
            .map_err(|e| BusError::Admin(e.to_string()))?;

        let mapped = messages.filter_map(|result| async move {
            match result {
                Ok(message) => Some(Box::new(NatsBusMessage { message }) as Box<dyn BusMessage>),
                Err(e) => {
                    warn!(error = %e, "failed to receive message from durable consumer");
                    None
                }
            }
        });

        Ok(Box::pin(mapped))
    }
}

/// Wraps a single JetStream message with its ack/term lifecycle.
pub struct NatsBusMessage {
    message: jetstream::Message,
}

#[async_trait]
impl BusMessage for NatsBusMessage {
    fn payload(&self) -> &[u8] {
        &self.message.payload
    }

    fn subject(&self) -> &str {
        self.message.subject.as_str()
    }

    async fn ack(&self) -> Result<(), BusError> {
        self.message
            .ack()
            .await
            .map_err(|e| BusError::Ack(e.to_string()))
    }

    async fn term(&self) -> Result<(), BusError> {
        self.message
            .ack_with(AckKind::Term)
            .await
            .map_err(|e| BusError::Ack(e.to_string()))
    }
}
