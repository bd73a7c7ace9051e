//! DTO for per-mapping statistics.

use serde::Serialize;

use crate::domain::entities::Mapping;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub short_id: String,
    pub long_url: String,
    pub click_count: i64,
}

impl From<Mapping> for StatsResponse {
    fn from(mapping: Mapping) -> Self {
        Self {
            short_id: mapping.short_id,
            long_url: mapping.long_url,
            click_count: mapping.click_count,
        }
    }
}
