//! Mapping entity: the durable record behind every short URL.

use chrono::{DateTime, Utc};

/// A short code to long URL mapping as stored in the `urls` table.
///
/// `short_id` and `long_url` are immutable after creation. The only field
/// that ever changes is `click_count`, and only upwards.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Mapping {
    pub id: i64,
    pub short_id: String,
    pub long_url: String,
    #[sqlx(rename = "user_id")]
    pub owner_id: Option<i64>,
    pub click_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Mapping {
    /// Returns true if `requester_id` owns this mapping.
    ///
    /// Anonymous mappings have no owner and can never be deleted through the API.
    pub fn is_owned_by(&self, requester_id: i64) -> bool {
        self.owner_id == Some(requester_id)
    }
}

/// Input data for inserting a new mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMapping {
    pub short_id: String,
    pub long_url: String,
    pub owner_id: Option<i64>,
}

/// Result of a delete request.
///
/// Expected business outcomes are values, not errors, so the HTTP layer has
/// to match every case explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    Forbidden,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(owner_id: Option<i64>) -> Mapping {
        let now = Utc::now();
        Mapping {
            id: 1,
            short_id: "abcDEF12345".to_string(),
            long_url: "http://example.com/a/b/c".to_string(),
            owner_id,
            click_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_owner_matches() {
        assert!(mapping(Some(7)).is_owned_by(7));
        assert!(!mapping(Some(7)).is_owned_by(8));
    }

    #[test]
    fn test_anonymous_mapping_has_no_owner() {
        assert!(!mapping(None).is_owned_by(7));
    }
}
