//! Event contracts exchanged between services over the broker.
//!
//! Every event travels as a JSON object with camelCase keys on its own named
//! queue. Consumers treat a payload that fails [`decode`] as permanently
//! malformed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Queue carrying [`MappingCreated`] events.
pub const MAPPING_CREATED_QUEUE: &str = "mapping-created";
/// Queue carrying [`MappingDeleted`] events.
pub const MAPPING_DELETED_QUEUE: &str = "mapping-deleted";
/// Queue carrying [`ClickRecorded`] events.
pub const CLICK_RECORDED_QUEUE: &str = "click-recorded";

/// All queues the pipeline uses.
pub const ALL_QUEUES: [&str; 3] = [
    MAPPING_CREATED_QUEUE,
    MAPPING_DELETED_QUEUE,
    CLICK_RECORDED_QUEUE,
];

/// An event bound to a specific queue.
pub trait QueueEvent: Serialize + DeserializeOwned + Send + Sync {
    const QUEUE: &'static str;

    fn short_id(&self) -> &str;
}

/// Published by the writer after a mapping is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingCreated {
    pub short_id: String,
    pub long_url: String,
}

impl QueueEvent for MappingCreated {
    const QUEUE: &'static str = MAPPING_CREATED_QUEUE;

    fn short_id(&self) -> &str {
        &self.short_id
    }
}

/// Published by the writer after a mapping row is removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingDeleted {
    pub short_id: String,
}

impl QueueEvent for MappingDeleted {
    const QUEUE: &'static str = MAPPING_DELETED_QUEUE;

    fn short_id(&self) -> &str {
        &self.short_id
    }
}

/// Published by the redirector for every cache hit.
///
/// Losing one of these undercounts clicks but never corrupts state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickRecorded {
    pub short_id: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
}

impl ClickRecorded {
    /// Creates a click event stamped with the current time.
    pub fn now(short_id: String, user_agent: Option<&str>, referrer: Option<&str>) -> Self {
        Self {
            short_id,
            timestamp: Utc::now(),
            user_agent: user_agent.map(str::to_string),
            referrer: referrer.map(str::to_string),
        }
    }
}

impl QueueEvent for ClickRecorded {
    const QUEUE: &'static str = CLICK_RECORDED_QUEUE;

    fn short_id(&self) -> &str {
        &self.short_id
    }
}

/// Why a payload could not be turned into an event.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("payload has an empty shortId")]
    MissingShortId,
}

/// Serializes an event into its wire payload.
pub fn encode<E: QueueEvent>(event: &E) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(event)
}

/// Parses a wire payload, rejecting events without a usable short id.
pub fn decode<E: QueueEvent>(payload: &[u8]) -> Result<E, EventError> {
    let event: E = serde_json::from_slice(payload)?;
    if event.short_id().trim().is_empty() {
        return Err(EventError::MissingShortId);
    }
    Ok(event)
}
