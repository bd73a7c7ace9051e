//! Infrastructure layer for external integrations.
//!
//! Implements the interfaces defined by the domain layer against
//! PostgreSQL and Redis.
//!
//! - [`broker`] - Event queues (Redis reliable queues, in-memory)
//! - [`cache`] - Hot-path `url:{shortId}` cache (Redis, in-memory)
//! - [`connection`] - Owned Redis connection handles shared by cache and broker
//! - [`persistence`] - Mapping repositories (PostgreSQL, in-memory)

pub mod broker;
pub mod cache;
pub mod connection;
pub mod persistence;
