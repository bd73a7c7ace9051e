//! Message broker used for the pipeline's three event queues.
//!
//! Provides [`EventPublisher`] and [`MessageConsumer`] traits with two
//! implementations:
//! - [`RedisPublisher`] / [`RedisConsumer`] - reliable queues on Redis lists
//! - [`MemoryBroker`] - in-process queues with the same ack/nack semantics, for tests
//!
//! Delivery is at-least-once. Each consumer holds at most one unsettled
//! message (prefetch = 1).

mod memory_broker;
mod redis_broker;
mod service;

pub use memory_broker::{MemoryBroker, MemoryConsumer};
pub use redis_broker::{QueueDepth, RedisConsumer, RedisPublisher};
pub use service::{BrokerError, Delivery, EventPublisher, MessageConsumer, publish_event};
