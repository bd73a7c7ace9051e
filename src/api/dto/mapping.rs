//! DTOs for mapping creation and listing.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::entities::Mapping;

/// Request to shorten a URL.
///
/// Only length is checked here; scheme defaulting and URL validation happen
/// in the service so bare domains are accepted.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMappingRequest {
    #[validate(length(min = 1, max = 2048, message = "longUrl must be 1-2048 characters"))]
    pub long_url: String,
}

/// A mapping as returned by the writer.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingResponse {
    pub id: i64,
    pub short_id: String,
    pub long_url: String,
    pub full_short_url: String,
}

impl MappingResponse {
    pub fn new(mapping: Mapping, full_short_url: String) -> Self {
        Self {
            id: mapping.id,
            short_id: mapping.short_id,
            long_url: mapping.long_url,
            full_short_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_uses_camel_case() {
        let request: CreateMappingRequest =
            serde_json::from_str(r#"{"longUrl":"http://example.com"}"#).unwrap();
        assert_eq!(request.long_url, "http://example.com");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_empty_and_oversized_urls_rejected() {
        let empty = CreateMappingRequest {
            long_url: String::new(),
        };
        assert!(empty.validate().is_err());

        let huge = CreateMappingRequest {
            long_url: format!("https://example.com/{}", "a".repeat(2048)),
        };
        assert!(huge.validate().is_err());
    }
}
