//! Writes `MappingCreated` events into the cache.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use super::runner::{Disposition, MessageHandler};
use crate::domain::events::{MappingCreated, decode};
use crate::infrastructure::cache::CacheService;

/// Handler for the `mapping-created` queue.
///
/// The cache write is unconditional, so a redelivered event leaves the
/// cache exactly as a single delivery would.
pub struct CachePopulator {
    cache: Arc<dyn CacheService>,
}

impl CachePopulator {
    pub fn new(cache: Arc<dyn CacheService>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl MessageHandler for CachePopulator {
    async fn handle(&self, payload: &[u8]) -> Disposition {
        let event = match decode::<MappingCreated>(payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Discarding malformed MappingCreated");
                return Disposition::Discard;
            }
        };

        match self.cache.set_url(&event.short_id, &event.long_url).await {
            Ok(()) => {
                debug!(short_id = %event.short_id, "Cache populated");
                Disposition::Ack
            }
            Err(e) => {
                error!(short_id = %event.short_id, error = %e, "Cache write failed, requeueing");
                Disposition::Requeue
            }
        }
    }
}
