//! Evicts cache entries for `MappingDeleted` events.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use super::runner::{Disposition, MessageHandler};
use crate::domain::events::{MappingDeleted, decode};
use crate::infrastructure::cache::CacheService;

/// Handler for the `mapping-deleted` queue.
///
/// Evicting a key that is already gone still acks.
pub struct DeletionPropagator {
    cache: Arc<dyn CacheService>,
}

impl DeletionPropagator {
    pub fn new(cache: Arc<dyn CacheService>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl MessageHandler for DeletionPropagator {
    async fn handle(&self, payload: &[u8]) -> Disposition {
        let event = match decode::<MappingDeleted>(payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Discarding malformed MappingDeleted");
                return Disposition::Discard;
            }
        };

        match self.cache.invalidate(&event.short_id).await {
            Ok(removed) => {
                debug!(short_id = %event.short_id, removed, "Cache entry evicted");
                Disposition::Ack
            }
            Err(e) => {
                error!(short_id = %event.short_id, error = %e, "Cache evict failed, requeueing");
                Disposition::Requeue
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::cache::MemoryCache;

    #[tokio::test]
    async fn test_evicts_entry() {
        let cache = Arc::new(MemoryCache::new());
        cache.set_url("abc", "https://example.com").await.unwrap();
        let handler = DeletionPropagator::new(cache.clone());

        let disposition = handler.handle(br#"{"shortId":"abc"}"#).await;

        assert_eq!(disposition, Disposition::Ack);
        assert_eq!(cache.get_url("abc").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_key_still_acks() {
        let cache = Arc::new(MemoryCache::new());
        let handler = DeletionPropagator::new(cache);

        let first = handler.handle(br#"{"shortId":"abc"}"#).await;
        let second = handler.handle(br#"{"shortId":"abc"}"#).await;

        assert_eq!(first, Disposition::Ack);
        assert_eq!(second, Disposition::Ack);
    }

    #[tokio::test]
    async fn test_missing_short_id_is_discarded() {
        let handler = DeletionPropagator::new(Arc::new(MemoryCache::new()));

        assert_eq!(handler.handle(b"{}").await, Disposition::Discard);
        assert_eq!(
            handler.handle(br#"{"shortId":""}"#).await,
            Disposition::Discard
        );
    }

    #[tokio::test]
    async fn test_cache_failure_requeues() {
        let cache = Arc::new(MemoryCache::new());
        cache.set_unavailable(true);
        let handler = DeletionPropagator::new(cache);

        assert_eq!(
            handler.handle(br#"{"shortId":"abc"}"#).await,
            Disposition::Requeue
        );
    }
}
