//! Folds `ClickRecorded` events into the durable click counters.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::runner::{Disposition, MessageHandler};
use crate::domain::events::{ClickRecorded, decode};
use crate::domain::repositories::MappingRepository;
use crate::error::AppError;

/// Result of applying one click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    Counted,
    /// The mapping was deleted after the click happened.
    MappingGone,
}

/// Handler for the `click-recorded` queue.
///
/// Each event is one atomic `+1`, so events for the same code commute.
pub struct ClickAggregator {
    repository: Arc<dyn MappingRepository>,
}

impl ClickAggregator {
    pub fn new(repository: Arc<dyn MappingRepository>) -> Self {
        Self { repository }
    }

    /// Increments the counter for one click.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] if the store is unreachable.
    pub async fn apply(&self, event: &ClickRecorded) -> Result<ClickOutcome, AppError> {
        if self.repository.increment_clicks(&event.short_id).await? {
            Ok(ClickOutcome::Counted)
        } else {
            Ok(ClickOutcome::MappingGone)
        }
    }
}

#[async_trait]
impl MessageHandler for ClickAggregator {
    async fn handle(&self, payload: &[u8]) -> Disposition {
        let event = match decode::<ClickRecorded>(payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Discarding malformed ClickRecorded");
                return Disposition::Discard;
            }
        };

        match self.apply(&event).await {
            Ok(ClickOutcome::Counted) => {
                debug!(short_id = %event.short_id, "Click counted");
                Disposition::Ack
            }
            Ok(ClickOutcome::MappingGone) => {
                info!(short_id = %event.short_id, "Click for deleted mapping ignored");
                Disposition::Ack
            }
            Err(e) => {
                error!(short_id = %event.short_id, error = %e, "Click increment failed, requeueing");
                Disposition::Requeue
            }
        }
    }
}
