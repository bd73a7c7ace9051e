//! Handler for per-mapping statistics.

use axum::{
    Json,
    extract::{Path, State},
};
use serde_json::json;

use crate::api::dto::stats::StatsResponse;
use crate::error::AppError;
use crate::state::WriterState;

/// Returns the click counter of a mapping.
///
/// # Endpoint
///
/// `GET /stats/{shortId}`
///
/// Reads the durable store, so the count trails redirects by however long
/// the click aggregator takes to drain its queue.
///
/// # Response
///
/// ```json
/// { "shortId": "aZ3kP9qLm2X", "longUrl": "http://example.com", "clickCount": 42 }
/// ```
///
/// # Errors
///
/// Returns 404 Not Found if the mapping does not exist.
pub async fn stats_handler(
    State(state): State<WriterState>,
    Path(short_id): Path<String>,
) -> Result<Json<StatsResponse>, AppError> {
    let mapping = state
        .mapping_service
        .stats(&short_id)
        .await?
        .ok_or_else(|| AppError::not_found("Short link not found", json!({ "shortId": short_id })))?;

    Ok(Json(mapping.into()))
}
