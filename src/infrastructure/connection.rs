//! Owned, lazily connected Redis handles.
//!
//! Each process creates the handles it needs at startup and passes them to
//! the components that use them; nothing is stored in globals.
//!
//! # Lifecycle
//!
//! 1. [`RedisHandle::new`] parses the URL without touching the network
//! 2. [`RedisHandle::connect`] (or the first [`RedisHandle::handle`] call)
//!    establishes the connection with a bounded number of attempts
//! 3. [`RedisHandle::handle`] hands out cheap clones of the multiplexed
//!    connection, which reconnects transparently after transient drops
//! 4. [`RedisHandle::close`] drops the connection; later `handle()` calls fail

use redis::{Client, aio::ConnectionManager};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_retry::{
    Retry,
    strategy::{ExponentialBackoff, jitter},
};
use tracing::{info, warn};

use crate::config::mask_connection_string;

/// Errors raised while establishing or using a handle.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("invalid {name} URL: {source}")]
    InvalidUrl {
        name: &'static str,
        source: redis::RedisError,
    },

    #[error("failed to connect {name} after {attempts} attempts: {source}")]
    Connect {
        name: &'static str,
        attempts: usize,
        source: redis::RedisError,
    },

    #[error("{0} connection is closed")]
    Closed(&'static str),
}

/// A single Redis connection owned by one component of one process.
pub struct RedisHandle {
    name: &'static str,
    url: String,
    client: Client,
    attempts: usize,
    conn: RwLock<Option<ConnectionManager>>,
    closed: AtomicBool,
}

impl RedisHandle {
    /// Creates an unconnected handle.
    ///
    /// `name` labels the handle in logs and errors (e.g. `"cache"`,
    /// `"broker-publish"`). `attempts` bounds connection retries.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::InvalidUrl`] if the URL cannot be parsed.
    pub fn new(name: &'static str, url: &str, attempts: usize) -> Result<Self, ConnectionError> {
        let client =
            Client::open(url).map_err(|source| ConnectionError::InvalidUrl { name, source })?;

        Ok(Self {
            name,
            url: mask_connection_string(url),
            client,
            attempts: attempts.max(1),
            conn: RwLock::new(None),
            closed: AtomicBool::new(false),
        })
    }

    /// Creates a handle and connects it immediately.
    ///
    /// Used at service startup so a missing dependency surfaces as a startup
    /// failure instead of a hang.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Connect`] once all attempts are exhausted.
    pub async fn connect(
        name: &'static str,
        url: &str,
        attempts: usize,
    ) -> Result<Self, ConnectionError> {
        let handle = Self::new(name, url, attempts)?;
        handle.handle().await?;
        Ok(handle)
    }

    /// Returns the live connection, connecting on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Closed`] after [`Self::close`], or
    /// [`ConnectionError::Connect`] if the lazy connection fails.
    pub async fn handle(&self) -> Result<ConnectionManager, ConnectionError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ConnectionError::Closed(self.name));
        }

        if let Some(conn) = self.conn.read().await.as_ref() {
            return Ok(conn.clone());
        }

        let mut slot = self.conn.write().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }

        let manager = self.establish().await?;
        *slot = Some(manager.clone());
        Ok(manager)
    }

    /// Drops the connection. Subsequent [`Self::handle`] calls fail.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        if self.conn.write().await.take().is_some() {
            info!(name = self.name, "Closed Redis connection");
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    async fn establish(&self) -> Result<ConnectionManager, ConnectionError> {
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(100)
            .max_delay(Duration::from_secs(2))
            .map(jitter)
            .take(self.attempts - 1);

        let manager = Retry::spawn(strategy, move || async move {
            let manager = ConnectionManager::new(self.client.clone())
                .await
                .inspect_err(|e| warn!(name = self.name, error = %e, "Redis connect attempt failed"))?;

            let mut probe = manager.clone();
            let _: String = redis::cmd("PING")
                .query_async(&mut probe)
                .await
                .inspect_err(|e| warn!(name = self.name, error = %e, "Redis PING failed"))?;

            Ok::<_, redis::RedisError>(manager)
        })
        .await
        .map_err(|source| ConnectionError::Connect {
            name: self.name,
            attempts: self.attempts,
            source,
        })?;

        info!(name = self.name, url = %self.url, "✓ Connected to Redis");
        Ok(manager)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_url_rejected_without_network() {
        let result = RedisHandle::new("cache", "not a url", 3);
        assert!(matches!(
            result,
            Err(ConnectionError::InvalidUrl { name: "cache", .. })
        ));
    }

    #[test]
    fn test_attempts_at_least_one() {
        let handle = RedisHandle::new("cache", "redis://127.0.0.1:6379/0", 0).unwrap();
        assert_eq!(handle.attempts, 1);
        assert_eq!(handle.name(), "cache");
    }

    #[tokio::test]
    async fn test_closed_handle_refuses_connections() {
        let handle = RedisHandle::new("broker-publish", "redis://127.0.0.1:6379/0", 1).unwrap();
        handle.close().await;

        let result = handle.handle().await;
        assert!(matches!(result, Err(ConnectionError::Closed("broker-publish"))));
    }
}
