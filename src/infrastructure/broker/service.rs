//! Broker traits and error types.

use async_trait::async_trait;
use tracing::debug;

use crate::domain::events::{QueueEvent, encode};
use crate::infrastructure::connection::ConnectionError;

/// Errors raised by broker operations.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("broker connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("broker command failed on queue '{queue}': {message}")]
    Command { queue: String, message: String },

    #[error("consumer on queue '{0}' already holds an unsettled message")]
    PrefetchExceeded(String),

    #[error("failed to serialize event: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BrokerError {
    pub(crate) fn command(queue: &str, err: impl std::fmt::Display) -> Self {
        Self::Command {
            queue: queue.to_string(),
            message: err.to_string(),
        }
    }
}

/// A message taken off a queue and not yet settled.
///
/// Must be handed back to [`MessageConsumer::ack`] or [`MessageConsumer::nack`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub queue: String,
    pub payload: Vec<u8>,
}

/// Publishing side of the broker.
///
/// A successful return means the broker confirmed the message is enqueued.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Enqueues a raw payload on a named queue.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] if the broker did not confirm the message.
    async fn publish_raw(&self, queue: &str, payload: Vec<u8>) -> Result<(), BrokerError>;

    /// Checks if the broker is reachable.
    async fn health_check(&self) -> bool;
}

/// Consuming side of the broker, bound to one queue and one worker.
#[async_trait]
pub trait MessageConsumer: Send + Sync {
    fn queue(&self) -> &str;

    /// Returns messages left unsettled by a previous run of this worker to
    /// the queue, so they are redelivered. Returns how many were recovered.
    async fn recover(&self) -> Result<usize, BrokerError>;

    /// Takes the next message if one is available, without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::PrefetchExceeded`] if the previous delivery has
    /// not been settled yet.
    async fn receive(&self) -> Result<Option<Delivery>, BrokerError>;

    /// Settles a delivery as processed.
    async fn ack(&self, delivery: Delivery) -> Result<(), BrokerError>;

    /// Settles a delivery as failed. With `requeue` it is redelivered next;
    /// without, it is discarded permanently.
    async fn nack(&self, delivery: Delivery, requeue: bool) -> Result<(), BrokerError>;
}

/// Serializes and publishes an event on its own queue.
///
/// # Errors
///
/// Returns [`BrokerError`] on serialization or publish failure. Callers on
/// the write path log this and carry on; the committed row is unaffected.
pub async fn publish_event<E: QueueEvent>(
    publisher: &dyn EventPublisher,
    event: &E,
) -> Result<(), BrokerError> {
    let payload = encode(event)?;
    let result = publisher.publish_raw(E::QUEUE, payload).await;

    let outcome = if result.is_ok() { "confirmed" } else { "failed" };
    metrics::counter!("events_published_total", "queue" => E::QUEUE, "outcome" => outcome)
        .increment(1);

    if result.is_ok() {
        debug!(queue = E::QUEUE, short_id = event.short_id(), "Event published");
    }
    result
}
