//! Consume loop shared by every queue worker.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::infrastructure::broker::{BrokerError, MessageConsumer};

/// What to do with a delivery once its handler has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Processed; remove from the queue.
    Ack,
    /// Can never succeed (malformed payload); remove without redelivery.
    Discard,
    /// Failed on a transient condition; redeliver.
    Requeue,
}

impl Disposition {
    fn as_str(self) -> &'static str {
        match self {
            Disposition::Ack => "ack",
            Disposition::Discard => "discard",
            Disposition::Requeue => "requeue",
        }
    }
}

/// Processes one payload from a queue.
///
/// Handlers must be idempotent: the broker delivers at least once.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, payload: &[u8]) -> Disposition;
}

/// Timing knobs for [`run_consumer`].
#[derive(Debug, Clone, Copy)]
pub struct ConsumerSettings {
    /// Sleep when the queue is empty.
    pub poll_interval: Duration,
    /// Sleep after a requeue, so a down dependency is not hammered.
    pub requeue_backoff: Duration,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(200),
            requeue_backoff: Duration::from_millis(500),
        }
    }
}

/// Takes at most one message, runs the handler and settles the delivery.
///
/// Returns `None` when the queue was empty.
///
/// # Errors
///
/// Returns [`BrokerError`] if receiving or settling fails. A message whose
/// settle failed stays in flight and is recovered on the next start.
pub async fn process_next(
    consumer: &dyn MessageConsumer,
    handler: &dyn MessageHandler,
) -> Result<Option<Disposition>, BrokerError> {
    let Some(delivery) = consumer.receive().await? else {
        return Ok(None);
    };

    let disposition = handler.handle(&delivery.payload).await;
    match disposition {
        Disposition::Ack => consumer.ack(delivery).await?,
        Disposition::Discard => consumer.nack(delivery, false).await?,
        Disposition::Requeue => consumer.nack(delivery, true).await?,
    }

    let queue = consumer.queue().to_string();
    debug!(queue = %queue, outcome = disposition.as_str(), "Message settled");
    metrics::counter!(
        "consumer_messages_total",
        "queue" => queue,
        "outcome" => disposition.as_str()
    )
    .increment(1);

    Ok(Some(disposition))
}

/// Waits for `delay` or until shutdown is requested. Returns true on shutdown.
async fn pause(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
    }
}

/// Runs a consumer until `shutdown` flips to true.
///
/// Leftovers from a previous run of the same worker are recovered first.
/// Messages are processed one at a time; the message being handled when
/// shutdown arrives is settled before the loop exits.
///
/// # Errors
///
/// Returns [`BrokerError`] only if the startup recovery fails. Errors while
/// consuming are logged, any unsettled message is handed back to the queue,
/// and consumption resumes after the poll interval. The handed-back message
/// is redelivered, which handlers tolerate.
pub async fn run_consumer(
    consumer: &dyn MessageConsumer,
    handler: &dyn MessageHandler,
    settings: ConsumerSettings,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), BrokerError> {
    let queue = consumer.queue().to_string();

    let recovered = consumer.recover().await?;
    if recovered > 0 {
        warn!(queue = %queue, recovered, "Requeued unsettled messages from a previous run");
    }
    info!(queue = %queue, "Consumer started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let delay = match process_next(consumer, handler).await {
            Ok(Some(Disposition::Requeue)) => settings.requeue_backoff,
            Ok(Some(_)) => continue,
            Ok(None) => settings.poll_interval,
            Err(e) => {
                error!(queue = %queue, error = %e, "Consume failed");
                // A failed settle leaves the message in flight and blocks receive.
                match consumer.recover().await {
                    Ok(0) => {}
                    Ok(recovered) => {
                        warn!(queue = %queue, recovered, "Returned unsettled message to queue")
                    }
                    Err(e) => warn!(queue = %queue, error = %e, "Recovery after consume error failed"),
                }
                settings.poll_interval
            }
        };

        if pause(delay, &mut shutdown).await {
            break;
        }
    }

    info!(queue = %queue, "Consumer stopped");
    Ok(())
}
