//! Handlers for mapping creation, listing and deletion.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::json;
use validator::Validate;

use crate::api::dto::mapping::{CreateMappingRequest, MappingResponse};
use crate::api::middleware::identity::Requester;
use crate::domain::entities::DeleteOutcome;
use crate::error::AppError;
use crate::state::WriterState;

/// Creates a mapping for a long URL.
///
/// # Endpoint
///
/// `POST /urls`
///
/// Anonymous when no `X-User-Id` header is sent; such mappings can never be
/// deleted through the API.
///
/// # Request Body
///
/// ```json
/// { "longUrl": "http://example.com/a/b/c" }
/// ```
///
/// # Response
///
/// ```json
/// {
///   "id": 1,
///   "shortId": "aZ3kP9qLm2X",
///   "longUrl": "http://example.com/a/b/c",
///   "fullShortUrl": "http://localhost:3001/aZ3kP9qLm2X"
/// }
/// ```
///
/// # Errors
///
/// - **400 Bad Request**: missing, oversized or non-HTTP(S) URL
/// - **401 Unauthorized**: `X-User-Id` is malformed or names no known user
/// - **409 Conflict**: `short_code_exhausted`, safe to retry
pub async fn create_mapping_handler(
    State(state): State<WriterState>,
    requester: Option<Requester>,
    Json(payload): Json<CreateMappingRequest>,
) -> Result<(StatusCode, Json<MappingResponse>), AppError> {
    payload.validate()?;

    let owner_id = requester.map(|Requester(id)| id);
    let mapping = state
        .mapping_service
        .create_mapping(&payload.long_url, owner_id)
        .await?;

    let full_short_url = state.mapping_service.full_short_url(&mapping.short_id);
    Ok((
        StatusCode::CREATED,
        Json(MappingResponse::new(mapping, full_short_url)),
    ))
}

/// Lists the caller's mappings, newest first.
///
/// # Endpoint
///
/// `GET /urls/mine` (requires `X-User-Id`)
pub async fn list_mine_handler(
    State(state): State<WriterState>,
    Requester(owner_id): Requester,
) -> Result<Json<Vec<MappingResponse>>, AppError> {
    let mappings = state.mapping_service.list_mine(owner_id).await?;

    let items = mappings
        .into_iter()
        .map(|mapping| {
            let full_short_url = state.mapping_service.full_short_url(&mapping.short_id);
            MappingResponse::new(mapping, full_short_url)
        })
        .collect();

    Ok(Json(items))
}

/// Deletes one of the caller's mappings.
///
/// # Endpoint
///
/// `DELETE /urls/{shortId}` (requires `X-User-Id`)
///
/// # Response Codes
///
/// - **204 No Content**: deleted; the cache entry is evicted asynchronously
/// - **404 Not Found**: no such mapping
/// - **403 Forbidden**: the caller does not own it
pub async fn delete_mapping_handler(
    State(state): State<WriterState>,
    Requester(requester_id): Requester,
    Path(short_id): Path<String>,
) -> Result<StatusCode, AppError> {
    match state
        .mapping_service
        .delete_mapping(&short_id, requester_id)
        .await?
    {
        DeleteOutcome::Deleted => Ok(StatusCode::NO_CONTENT),
        DeleteOutcome::NotFound => Err(AppError::not_found(
            "Short link not found",
            json!({ "shortId": short_id }),
        )),
        DeleteOutcome::Forbidden => Err(AppError::forbidden(
            "You do not own this short link",
            json!({ "shortId": short_id }),
        )),
    }
}
