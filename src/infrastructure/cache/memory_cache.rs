//! In-process cache implementation for tests and local runs.

use super::service::{CacheError, CacheResult, CacheService, KEY_PREFIX, cache_key};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// A `HashMap`-backed cache keyed exactly like [`super::RedisCache`].
///
/// Can be switched into an "unreachable" state to exercise the failure
/// paths of the redirector and the consumers.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, String>>,
    unavailable: AtomicBool,
    lookups: AtomicUsize,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent operation fail (or succeed again) with a connection-style error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Snapshot of raw `url:{shortId}` keys and values.
    pub async fn snapshot(&self) -> HashMap<String, String> {
        self.entries.read().await.clone()
    }

    /// Number of `get_url` calls served so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn check(&self) -> CacheResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheError::Operation("cache unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheService for MemoryCache {
    async fn get_url(&self, short_id: &str) -> CacheResult<Option<String>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.entries.read().await.get(&cache_key(short_id)).cloned())
    }

    async fn set_url(&self, short_id: &str, long_url: &str) -> CacheResult<()> {
        self.check()?;
        self.entries
            .write()
            .await
            .insert(cache_key(short_id), long_url.to_string());
        Ok(())
    }

    async fn invalidate(&self, short_id: &str) -> CacheResult<bool> {
        self.check()?;
        Ok(self
            .entries
            .write()
            .await
            .remove(&cache_key(short_id))
            .is_some())
    }

    async fn cached_short_ids(&self) -> CacheResult<Vec<String>> {
        self.check()?;
        Ok(self
            .entries
            .read()
            .await
            .keys()
            .filter_map(|key| key.strip_prefix(KEY_PREFIX).map(str::to_string))
            .collect())
    }

    async fn health_check(&self) -> bool {
        self.check().is_ok()
    }
}
