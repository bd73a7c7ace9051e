//! HTTP-facing error type.
//!
//! Business outcomes that callers must branch on (delete results, cache hits
//! and misses) are modelled as enums elsewhere; [`AppError`] is reserved for
//! request failures that map directly onto a status code.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};

use crate::infrastructure::broker::BrokerError;
use crate::infrastructure::cache::CacheError;

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorInfo,
}

/// Machine-readable error description embedded in every error response.
#[derive(Debug, Serialize)]
pub struct ErrorInfo {
    pub code: &'static str,
    pub message: String,
    pub details: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Validation { message: String, details: Value },
    #[error("{message}")]
    Unauthorized { message: String, details: Value },
    #[error("{message}")]
    Forbidden { message: String, details: Value },
    #[error("{message}")]
    NotFound { message: String, details: Value },
    #[error("{message}")]
    Conflict {
        code: &'static str,
        message: String,
        details: Value,
    },
    #[error("{message}")]
    Internal { message: String, details: Value },
}

impl AppError {
    pub fn bad_request(message: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }

    pub fn unauthorized(message: impl Into<String>, details: Value) -> Self {
        Self::Unauthorized {
            message: message.into(),
            details,
        }
    }

    pub fn forbidden(message: impl Into<String>, details: Value) -> Self {
        Self::Forbidden {
            message: message.into(),
            details,
        }
    }

    pub fn not_found(message: impl Into<String>, details: Value) -> Self {
        Self::NotFound {
            message: message.into(),
            details,
        }
    }

    pub fn conflict(message: impl Into<String>, details: Value) -> Self {
        Self::Conflict {
            code: "conflict",
            message: message.into(),
            details,
        }
    }

    /// Conflict raised when every short-code generation attempt collided.
    ///
    /// Carries its own error code so clients can retry the whole request
    /// without confusing it with a validation failure.
    pub fn short_code_exhausted(attempts: usize) -> Self {
        Self::Conflict {
            code: "short_code_exhausted",
            message: "Could not allocate a unique short code, please retry".to_string(),
            details: json!({ "attempts": attempts }),
        }
    }

    pub fn internal(message: impl Into<String>, details: Value) -> Self {
        Self::Internal {
            message: message.into(),
            details,
        }
    }

    /// Returns `true` for conflicts caused by a unique-constraint violation on insert.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::Conflict { code: "unique_violation", .. })
    }

    /// Returns `true` for conflicts caused by a row referencing a missing parent.
    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(self, Self::Conflict { code: "foreign_key_violation", .. })
    }

    fn parts(self) -> (StatusCode, ErrorInfo) {
        let (status, code, message, details) = match self {
            AppError::Validation { message, details } => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                message,
                details,
            ),
            AppError::Unauthorized { message, details } => {
                (StatusCode::UNAUTHORIZED, "unauthorized", message, details)
            }
            AppError::Forbidden { message, details } => {
                (StatusCode::FORBIDDEN, "forbidden", message, details)
            }
            AppError::NotFound { message, details } => {
                (StatusCode::NOT_FOUND, "not_found", message, details)
            }
            AppError::Conflict {
                code,
                message,
                details,
            } => (StatusCode::CONFLICT, code, message, details),
            AppError::Internal { message, details } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                message,
                details,
            ),
        };

        (
            status,
            ErrorInfo {
                code,
                message,
                details,
            },
        )
    }

    /// Converts the error into its JSON description without the status code.
    pub fn to_error_info(self) -> ErrorInfo {
        self.parts().1
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = self.parts();
        let mut response = (status, Json(ErrorBody { error })).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("Bearer"),
            );
        }

        response
    }
}

/// Maps a SQLx error onto [`AppError`].
///
/// Unique and foreign-key violations become conflicts with their own codes
/// so callers can tell them apart from other database failures.
pub fn map_sqlx_error(e: sqlx::Error) -> AppError {
    if let Some(db) = e.as_database_error() {
        if db.is_unique_violation() {
            return AppError::Conflict {
                code: "unique_violation",
                message: "Unique constraint violation".to_string(),
                details: json!({ "constraint": db.constraint() }),
            };
        }
        if db.is_foreign_key_violation() {
            return AppError::Conflict {
                code: "foreign_key_violation",
                message: "Foreign key violation".to_string(),
                details: json!({ "constraint": db.constraint() }),
            };
        }
    }

    tracing::error!(error = %e, "Database error");
    AppError::internal("Database error", json!({}))
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        map_sqlx_error(e)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details = serde_json::to_value(&errors).unwrap_or_else(|_| json!({}));
        AppError::bad_request("Request validation failed", details)
    }
}

impl From<CacheError> for AppError {
    fn from(e: CacheError) -> Self {
        tracing::error!(error = %e, "Cache unavailable");
        AppError::internal("Cache unavailable", json!({}))
    }
}

impl From<BrokerError> for AppError {
    fn from(e: BrokerError) -> Self {
        tracing::error!(error = %e, "Broker unavailable");
        AppError::internal("Broker unavailable", json!({}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::bad_request("x", json!({})).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::forbidden("x", json!({})).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::short_code_exhausted(3).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_exhausted_conflict_is_distinct_from_validation() {
        let info = AppError::short_code_exhausted(3).to_error_info();
        assert_eq!(info.code, "short_code_exhausted");
        assert_eq!(info.details["attempts"], 3);

        let info = AppError::bad_request("bad url", json!({})).to_error_info();
        assert_eq!(info.code, "validation_error");
    }

    #[test]
    fn test_display_uses_message() {
        let err = AppError::not_found("Short link not found", json!({}));
        assert_eq!(err.to_string(), "Short link not found");
    }

    #[test]
    fn test_unique_violation_flag() {
        let err = AppError::Conflict {
            code: "unique_violation",
            message: "dup".to_string(),
            details: json!({}),
        };
        assert!(err.is_unique_violation());
        assert!(!err.is_foreign_key_violation());
        assert!(!AppError::short_code_exhausted(3).is_unique_violation());
    }

    #[test]
    fn test_foreign_key_violation_flag() {
        let err = AppError::Conflict {
            code: "foreign_key_violation",
            message: "fk".to_string(),
            details: json!({}),
        };
        assert!(err.is_foreign_key_violation());
        assert!(!err.is_unique_violation());
        assert!(!AppError::short_code_exhausted(3).is_foreign_key_violation());
    }
}
