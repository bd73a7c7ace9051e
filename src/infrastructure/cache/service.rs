//! Cache service trait and error types.

use async_trait::async_trait;

use crate::infrastructure::connection::ConnectionError;

/// Key namespace for cached mappings.
pub const KEY_PREFIX: &str = "url:";

/// Builds the cache key for a short id: `url:{shortId}`.
pub fn cache_key(short_id: &str) -> String {
    format!("{KEY_PREFIX}{short_id}")
}

/// Errors that can occur during cache operations.
///
/// Unlike a read-through cache, every caller here needs to see failures:
/// the populator requeues on them and the redirector has no fallback.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("cache operation error: {0}")]
    Operation(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        Self::Operation(e.to_string())
    }
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Hot-path store of `shortId -> longUrl`.
///
/// Values are plain strings with no structure. Entries have no TTL unless
/// the implementation was configured with one.
///
/// # Implementations
///
/// - [`crate::infrastructure::cache::RedisCache`] - Redis-backed cache
/// - [`crate::infrastructure::cache::MemoryCache`] - in-process cache for tests
#[async_trait]
pub trait CacheService: Send + Sync {
    /// Looks up the long URL for a short id.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the cache cannot be reached; a miss is `Ok(None)`.
    async fn get_url(&self, short_id: &str) -> CacheResult<Option<String>>;

    /// Stores a mapping unconditionally. Writing the same pair twice is harmless.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the write did not reach the cache.
    async fn set_url(&self, short_id: &str, long_url: &str) -> CacheResult<()>;

    /// Removes a mapping. Returns whether a key was actually removed.
    ///
    /// Removing a missing key is a success.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] only on transport failures.
    async fn invalidate(&self, short_id: &str) -> CacheResult<bool>;

    /// Lists every cached short id. Used by the reconciliation sweep.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on transport failures.
    async fn cached_short_ids(&self) -> CacheResult<Vec<String>>;

    /// Checks if the cache backend is reachable.
    async fn health_check(&self) -> bool;
}
