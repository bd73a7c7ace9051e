//! Caller identity extractor.
//!
//! Authentication happens upstream. The gateway forwards the authenticated
//! user id in the `X-User-Id` header; this service trusts it as-is.

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::request::Parts,
};
use serde_json::json;

use crate::error::AppError;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller.
///
/// Use `Requester` on routes that need an identity (401 without one) and
/// `Option<Requester>` where anonymous access is allowed. A header that is
/// present but not a positive integer is rejected in both cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester(pub i64);

fn parse_requester(parts: &Parts) -> Result<Option<Requester>, AppError> {
    let Some(value) = parts.headers.get(USER_ID_HEADER) else {
        return Ok(None);
    };

    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|id| *id > 0)
        .map(|id| Some(Requester(id)))
        .ok_or_else(|| {
            AppError::unauthorized(
                "Unauthorized",
                json!({ "reason": "X-User-Id header is not a valid user id" }),
            )
        })
}

impl<S: Send + Sync> FromRequestParts<S> for Requester {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parse_requester(parts)?.ok_or_else(|| {
            AppError::unauthorized(
                "Unauthorized",
                json!({ "reason": "X-User-Id header is missing" }),
            )
        })
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for Requester {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        parse_requester(parts)
    }
}
