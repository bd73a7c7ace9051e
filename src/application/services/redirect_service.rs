//! Hot-path resolution of short codes.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use crate::domain::events::ClickRecorded;
use crate::error::AppError;
use crate::infrastructure::broker::{EventPublisher, publish_event};
use crate::infrastructure::cache::CacheService;
use crate::utils::code_generator::{MAX_SHORT_ID_LENGTH, is_valid_short_id};

/// Outcome of a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Hit(String),
    Miss,
}

/// Request metadata attached to a click.
#[derive(Debug, Clone, Default)]
pub struct ClickMetadata {
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

/// Resolves short codes from the cache only.
///
/// Never consults the durable store: a code that is not cached is a miss.
pub struct RedirectService {
    cache: Arc<dyn CacheService>,
    publisher: Arc<dyn EventPublisher>,
}

impl RedirectService {
    pub fn new(cache: Arc<dyn CacheService>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self { cache, publisher }
    }

    /// Validates a short code and looks it up in the cache.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for syntactically invalid codes
    /// without a cache round trip.
    /// Returns [`AppError::Internal`] if the cache is unreachable.
    pub async fn resolve(&self, short_id: &str) -> Result<Resolution, AppError> {
        if !is_valid_short_id(short_id) {
            return Err(AppError::bad_request(
                "Invalid short code",
                json!({
                    "shortId": short_id,
                    "maxLength": MAX_SHORT_ID_LENGTH,
                }),
            ));
        }

        let resolution = match self.cache.get_url(short_id).await? {
            Some(long_url) => Resolution::Hit(long_url),
            None => Resolution::Miss,
        };

        let outcome = match resolution {
            Resolution::Hit(_) => "hit",
            Resolution::Miss => "miss",
        };
        metrics::counter!("redirects_total", "outcome" => outcome).increment(1);
        debug!(short_id, outcome, "Short code resolved");

        Ok(resolution)
    }

    /// Publishes a `ClickRecorded` event on a detached task.
    ///
    /// Returns immediately; a publish failure is logged and dropped.
    pub fn record_click(&self, short_id: &str, metadata: ClickMetadata) {
        let event = ClickRecorded::now(
            short_id.to_string(),
            metadata.user_agent.as_deref(),
            metadata.referrer.as_deref(),
        );
        let publisher = Arc::clone(&self.publisher);

        tokio::spawn(async move {
            if let Err(e) = publish_event(publisher.as_ref(), &event).await {
                warn!(short_id = %event.short_id, error = %e, "Click event dropped");
            }
        });
    }

    /// Returns true if the cache answers.
    pub async fn cache_healthy(&self) -> bool {
        self.cache.health_check().await
    }

    /// Returns true if the broker answers.
    pub async fn broker_healthy(&self) -> bool {
        self.publisher.health_check().await
    }
}
