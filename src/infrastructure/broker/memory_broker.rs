//! In-process broker with the same settle semantics as the Redis queues.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use super::service::{BrokerError, Delivery, EventPublisher, MessageConsumer};
use crate::domain::events::{QueueEvent, decode};

#[derive(Default)]
struct Queues {
    pending: HashMap<String, VecDeque<Vec<u8>>>,
    dead: HashMap<String, Vec<Vec<u8>>>,
}

/// Shared in-memory queues. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    queues: Arc<Mutex<Queues>>,
    publish_fails: Arc<AtomicBool>,
    publish_attempts: Arc<AtomicUsize>,
    settle_failures: Arc<AtomicUsize>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a consumer on `queue` with its own in-flight slot.
    pub fn consumer(&self, queue: &str) -> MemoryConsumer {
        MemoryConsumer {
            broker: self.clone(),
            queue: queue.to_string(),
            in_flight: Mutex::new(None),
        }
    }

    /// Makes subsequent publishes fail (or succeed again).
    pub fn set_publish_failure(&self, fail: bool) {
        self.publish_fails.store(fail, Ordering::SeqCst);
    }

    /// Makes the next `count` acks or nacks fail. A failed settle leaves the
    /// message in flight, as a dropped Redis transaction does.
    pub fn fail_settles(&self, count: usize) {
        self.settle_failures.store(count, Ordering::SeqCst);
    }

    /// Publishes finished so far, failed ones included.
    pub fn publish_attempts(&self) -> usize {
        self.publish_attempts.load(Ordering::SeqCst)
    }

    /// Waits until at least `expected` publishes have finished.
    ///
    /// Returns `false` if that takes longer than `timeout`.
    pub async fn wait_for_publishes(&self, expected: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.publish_attempts() < expected {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        true
    }

    fn take_settle_failure(&self) -> bool {
        self.settle_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Number of pending messages on `queue`.
    pub async fn depth(&self, queue: &str) -> usize {
        self.queues
            .lock()
            .await
            .pending
            .get(queue)
            .map_or(0, VecDeque::len)
    }

    /// Payloads discarded from `queue`.
    pub async fn dead_letters(&self, queue: &str) -> Vec<Vec<u8>> {
        self.queues
            .lock()
            .await
            .dead
            .get(queue)
            .cloned()
            .unwrap_or_default()
    }

    /// Decodes the pending events on an event's queue, oldest first, without consuming them.
    pub async fn pending<E: QueueEvent>(&self) -> Vec<E> {
        self.queues
            .lock()
            .await
            .pending
            .get(E::QUEUE)
            .map(|q| q.iter().filter_map(|p| decode::<E>(p).ok()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventPublisher for MemoryBroker {
    async fn publish_raw(&self, queue: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        let result = if self.publish_fails.load(Ordering::SeqCst) {
            Err(BrokerError::command(queue, "broker unavailable"))
        } else {
            self.queues
                .lock()
                .await
                .pending
                .entry(queue.to_string())
                .or_default()
                .push_back(payload);
            Ok(())
        };
        self.publish_attempts.fetch_add(1, Ordering::SeqCst);
        result
    }

    async fn health_check(&self) -> bool {
        !self.publish_fails.load(Ordering::SeqCst)
    }
}

/// A prefetch-1 consumer over a [`MemoryBroker`] queue.
pub struct MemoryConsumer {
    broker: MemoryBroker,
    queue: String,
    in_flight: Mutex<Option<Vec<u8>>>,
}

impl MemoryConsumer {
    async fn settle(&self) -> Result<(), BrokerError> {
        if self.broker.take_settle_failure() {
            return Err(BrokerError::command(&self.queue, "settle failed"));
        }
        self.in_flight.lock().await.take();
        Ok(())
    }
}

#[async_trait]
impl MessageConsumer for MemoryConsumer {
    fn queue(&self) -> &str {
        &self.queue
    }

    async fn recover(&self) -> Result<usize, BrokerError> {
        let Some(payload) = self.in_flight.lock().await.take() else {
            return Ok(0);
        };
        self.broker
            .queues
            .lock()
            .await
            .pending
            .entry(self.queue.clone())
            .or_default()
            .push_front(payload);
        Ok(1)
    }

    async fn receive(&self) -> Result<Option<Delivery>, BrokerError> {
        let mut in_flight = self.in_flight.lock().await;
        if in_flight.is_some() {
            return Err(BrokerError::PrefetchExceeded(self.queue.clone()));
        }

        let payload = self
            .broker
            .queues
            .lock()
            .await
            .pending
            .get_mut(&self.queue)
            .and_then(VecDeque::pop_front);

        Ok(payload.map(|payload| {
            *in_flight = Some(payload.clone());
            Delivery {
                queue: self.queue.clone(),
                payload,
            }
        }))
    }

    async fn ack(&self, _delivery: Delivery) -> Result<(), BrokerError> {
        self.settle().await
    }

    async fn nack(&self, delivery: Delivery, requeue: bool) -> Result<(), BrokerError> {
        self.settle().await?;
        let mut queues = self.broker.queues.lock().await;
        if requeue {
            queues
                .pending
                .entry(self.queue.clone())
                .or_default()
                .push_front(delivery.payload);
        } else {
            queues
                .dead
                .entry(self.queue.clone())
                .or_default()
                .push(delivery.payload);
        }
        Ok(())
    }
}
