//! Redis-backed cache implementation.

use super::service::{CacheResult, CacheService, KEY_PREFIX, cache_key};
use crate::infrastructure::connection::RedisHandle;
use async_trait::async_trait;
use redis::AsyncCommands;
use std::sync::Arc;
use tracing::{debug, warn};

/// Number of keys requested per `SCAN` round trip.
const SCAN_BATCH: usize = 500;

/// Redis cache for short id lookups.
///
/// Shares a single multiplexed connection per process through [`RedisHandle`].
/// Errors are logged and propagated so callers decide between retry
/// (consumers) and failing the request (redirector).
pub struct RedisCache {
    handle: Arc<RedisHandle>,
    ttl_seconds: Option<u64>,
}

impl RedisCache {
    /// Creates a cache over an owned connection handle.
    ///
    /// `ttl_seconds` of `None` stores entries without expiry; they live until
    /// the deletion propagator or the reconciler evicts them.
    pub fn new(handle: Arc<RedisHandle>, ttl_seconds: Option<u64>) -> Self {
        Self {
            handle,
            ttl_seconds,
        }
    }
}

#[async_trait]
impl CacheService for RedisCache {
    async fn get_url(&self, short_id: &str) -> CacheResult<Option<String>> {
        let key = cache_key(short_id);
        let mut conn = self.handle.handle().await?;

        let url = conn
            .get::<_, Option<String>>(&key)
            .await
            .inspect_err(|e| warn!(short_id, error = %e, "Redis GET failed"))?;

        match &url {
            Some(_) => debug!(short_id, "Cache HIT"),
            None => debug!(short_id, "Cache MISS"),
        }

        Ok(url)
    }

    async fn set_url(&self, short_id: &str, long_url: &str) -> CacheResult<()> {
        let key = cache_key(short_id);
        let mut conn = self.handle.handle().await?;

        let written = match self.ttl_seconds {
            Some(ttl) => conn.set_ex::<_, _, ()>(&key, long_url, ttl).await,
            None => conn.set::<_, _, ()>(&key, long_url).await,
        };
        written.inspect_err(|e| warn!(short_id, error = %e, "Redis SET failed"))?;

        debug!(short_id, ttl = ?self.ttl_seconds, "Cache SET");
        Ok(())
    }

    async fn invalidate(&self, short_id: &str) -> CacheResult<bool> {
        let key = cache_key(short_id);
        let mut conn = self.handle.handle().await?;

        let deleted = conn
            .del::<_, i64>(&key)
            .await
            .inspect_err(|e| warn!(short_id, error = %e, "Redis DEL failed"))?;

        debug!(short_id, existed = deleted > 0, "Cache INVALIDATE");
        Ok(deleted > 0)
    }

    async fn cached_short_ids(&self) -> CacheResult<Vec<String>> {
        let mut conn = self.handle.handle().await?;
        let pattern = format!("{KEY_PREFIX}*");
        let mut cursor: u64 = 0;
        let mut short_ids = Vec::new();

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;

            short_ids.extend(
                keys.into_iter()
                    .filter_map(|key| key.strip_prefix(KEY_PREFIX).map(str::to_string)),
            );

            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(short_ids)
    }

    async fn health_check(&self) -> bool {
        let Ok(mut conn) = self.handle.handle().await else {
            return false;
        };
        let pong: redis::RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
        pong.is_ok()
    }
}
