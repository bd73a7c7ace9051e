//! Handler for short URL redirect.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::application::services::{ClickMetadata, Resolution};
use crate::error::AppError;
use crate::state::RedirectorState;

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Redirects a short code to its long URL.
///
/// # Endpoint
///
/// `GET /{shortId}`
///
/// # Request Flow
///
/// 1. Validate the code syntactically (400 without a cache round trip)
/// 2. Single cache lookup; the durable store is never consulted
/// 3. Hit: spawn the click event publish, then return 302
/// 4. Miss: 302 to the configured not-found page, or 404
///
/// # Errors
///
/// Returns 500 if the cache is unreachable; there is no fallback.
pub async fn redirect_handler(
    State(state): State<RedirectorState>,
    Path(short_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    match state.redirect_service.resolve(&short_id).await? {
        Resolution::Hit(long_url) => {
            let metadata = ClickMetadata {
                user_agent: header_value(&headers, header::USER_AGENT),
                referrer: header_value(&headers, header::REFERER),
            };
            state.redirect_service.record_click(&short_id, metadata);

            Ok(found(&long_url))
        }
        Resolution::Miss => match state.not_found_redirect {
            Some(ref target) => Ok(found(target)),
            None => Err(AppError::not_found(
                "Short link not found",
                json!({ "shortId": short_id }),
            )),
        },
    }
}

fn header_value(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
