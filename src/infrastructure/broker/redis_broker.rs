//! Reliable queues on Redis lists.
//!
//! Layout for a queue named `q`:
//!
//! - `queue:q` - pending messages; producers `LPUSH`, consumers take from the right
//! - `queue:q:inflight:{worker}` - the single message a worker is processing
//! - `queue:q:dead` - discarded messages, kept for inspection only
//!
//! Taking a message is an atomic `LMOVE` from the queue into the worker's
//! in-flight list, so a crash between take and ack never loses it: the worker
//! moves it back on restart via [`MessageConsumer::recover`]. In-flight lists
//! of workers that never come back are found with
//! [`RedisPublisher::inflight_workers`] and drained by constructing a
//! [`RedisConsumer`] with the dead worker's id.

use async_trait::async_trait;
use redis::AsyncCommands;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use super::service::{BrokerError, Delivery, EventPublisher, MessageConsumer};
use crate::infrastructure::connection::RedisHandle;

fn queue_key(queue: &str) -> String {
    format!("queue:{queue}")
}

fn inflight_key(queue: &str, worker_id: &str) -> String {
    format!("queue:{queue}:inflight:{worker_id}")
}

fn dead_key(queue: &str) -> String {
    format!("queue:{queue}:dead")
}

/// Extracts the worker id from an in-flight key of `queue`.
fn worker_from_inflight_key<'a>(queue: &str, key: &'a str) -> Option<&'a str> {
    key.strip_prefix(&format!("queue:{queue}:inflight:"))
        .filter(|worker| !worker.is_empty())
}

/// Pending and dead-lettered message counts for one queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueDepth {
    pub pending: i64,
    pub dead: i64,
}

/// Publisher over a dedicated connection.
///
/// Kept separate from the consuming connection so publish failures are
/// observable independently of consume flow.
pub struct RedisPublisher {
    handle: Arc<RedisHandle>,
}

impl RedisPublisher {
    pub fn new(handle: Arc<RedisHandle>) -> Self {
        Self { handle }
    }

    /// Reports queue depth for operators.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] on connection or command failure.
    pub async fn queue_depth(&self, queue: &str) -> Result<QueueDepth, BrokerError> {
        let mut conn = self.handle.handle().await?;
        let pending = conn
            .llen::<_, i64>(queue_key(queue))
            .await
            .map_err(|e| BrokerError::command(queue, e))?;
        let dead = conn
            .llen::<_, i64>(dead_key(queue))
            .await
            .map_err(|e| BrokerError::command(queue, e))?;
        Ok(QueueDepth { pending, dead })
    }

    /// Lists workers holding unsettled messages on `queue`, with their counts.
    ///
    /// A worker listed here that is no longer running has stranded its
    /// messages; see `admin recover`.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] on connection or command failure.
    pub async fn inflight_workers(&self, queue: &str) -> Result<Vec<(String, i64)>, BrokerError> {
        let mut conn = self.handle.handle().await?;
        let pattern = format!("queue:{queue}:inflight:*");
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(|e| BrokerError::command(queue, e))?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        let mut workers = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(worker) = worker_from_inflight_key(queue, &key) else {
                continue;
            };
            let held = conn
                .llen::<_, i64>(&key)
                .await
                .map_err(|e| BrokerError::command(queue, e))?;
            if held > 0 {
                workers.push((worker.to_string(), held));
            }
        }
        workers.sort();
        Ok(workers)
    }
}

#[async_trait]
impl EventPublisher for RedisPublisher {
    async fn publish_raw(&self, queue: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        let mut conn = self.handle.handle().await?;
        let depth = conn
            .lpush::<_, _, i64>(queue_key(queue), payload.as_slice())
            .await
            .map_err(|e| BrokerError::command(queue, e))?;
        debug!(queue, depth, "Message enqueued");
        Ok(())
    }

    async fn health_check(&self) -> bool {
        let Ok(mut conn) = self.handle.handle().await else {
            return false;
        };
        let pong: redis::RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
        pong.is_ok()
    }
}

/// One worker's consumer on one queue.
pub struct RedisConsumer {
    handle: Arc<RedisHandle>,
    queue: String,
    worker_id: String,
    unsettled: AtomicBool,
}

impl RedisConsumer {
    /// Creates a consumer. `worker_id` names the in-flight list, so a stable
    /// id lets a restarted worker recover what it was processing.
    pub fn new(handle: Arc<RedisHandle>, queue: &str, worker_id: &str) -> Self {
        Self {
            handle,
            queue: queue.to_string(),
            worker_id: worker_id.to_string(),
            unsettled: AtomicBool::new(false),
        }
    }

    fn inflight(&self) -> String {
        inflight_key(&self.queue, &self.worker_id)
    }

    /// Removes the delivery from the in-flight list and, in the same
    /// transaction, optionally pushes it onto `target` (tail = consuming end).
    ///
    /// On failure the message stays in flight and the consumer keeps refusing
    /// new deliveries until [`MessageConsumer::recover`] returns it to the
    /// queue; `run_consumer` does that on every consume error.
    async fn settle(
        &self,
        delivery: &Delivery,
        target: Option<String>,
        tail: bool,
    ) -> Result<(), BrokerError> {
        let mut conn = self.handle.handle().await?;
        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("LREM")
            .arg(self.inflight())
            .arg(1)
            .arg(delivery.payload.as_slice())
            .ignore();

        if let Some(target) = target {
            let push = if tail { "RPUSH" } else { "LPUSH" };
            pipe.cmd(push)
                .arg(target)
                .arg(delivery.payload.as_slice())
                .ignore();
        }

        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| BrokerError::command(&self.queue, e))?;

        self.unsettled.store(false, Ordering::Release);
        Ok(())
    }
}

#[async_trait]
impl MessageConsumer for RedisConsumer {
    fn queue(&self) -> &str {
        &self.queue
    }

    async fn recover(&self) -> Result<usize, BrokerError> {
        let mut conn = self.handle.handle().await?;
        let mut recovered = 0;

        loop {
            let moved: Option<Vec<u8>> = redis::cmd("LMOVE")
                .arg(self.inflight())
                .arg(queue_key(&self.queue))
                .arg("RIGHT")
                .arg("RIGHT")
                .query_async(&mut conn)
                .await
                .map_err(|e| BrokerError::command(&self.queue, e))?;

            if moved.is_none() {
                break;
            }
            recovered += 1;
        }

        if recovered > 0 {
            info!(
                queue = %self.queue,
                worker_id = %self.worker_id,
                recovered,
                "Returned unsettled messages to queue"
            );
        }
        self.unsettled.store(false, Ordering::Release);
        Ok(recovered)
    }

    async fn receive(&self) -> Result<Option<Delivery>, BrokerError> {
        if self.unsettled.load(Ordering::Acquire) {
            return Err(BrokerError::PrefetchExceeded(self.queue.clone()));
        }

        let mut conn = self.handle.handle().await?;
        let payload: Option<Vec<u8>> = redis::cmd("LMOVE")
            .arg(queue_key(&self.queue))
            .arg(self.inflight())
            .arg("RIGHT")
            .arg("LEFT")
            .query_async(&mut conn)
            .await
            .map_err(|e| BrokerError::command(&self.queue, e))?;

        Ok(payload.map(|payload| {
            self.unsettled.store(true, Ordering::Release);
            Delivery {
                queue: self.queue.clone(),
                payload,
            }
        }))
    }

    async fn ack(&self, delivery: Delivery) -> Result<(), BrokerError> {
        self.settle(&delivery, None, false).await
    }

    async fn nack(&self, delivery: Delivery, requeue: bool) -> Result<(), BrokerError> {
        if requeue {
            // RPUSH puts it at the consuming end, so it is the next message taken.
            self.settle(&delivery, Some(queue_key(&self.queue)), true).await
        } else {
            warn!(queue = %self.queue, "Discarding message to dead-letter list");
            self.settle(&delivery, Some(dead_key(&self.queue)), false).await
        }
    }
}
