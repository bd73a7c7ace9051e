//! DTOs for health check endpoints.

use serde::Serialize;

/// Health check response with component status.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

/// Health status for each component a service depends on.
///
/// The writer reports `database` and `broker`; the redirector reports
/// `cache` and `broker`.
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<CheckStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CheckStatus>,
    pub broker: CheckStatus,
}

impl HealthChecks {
    pub fn all_ok(&self) -> bool {
        [self.database.as_ref(), self.cache.as_ref(), Some(&self.broker)]
            .into_iter()
            .flatten()
            .all(CheckStatus::is_ok)
    }
}

/// Individual component health status.
#[derive(Debug, Serialize)]
pub struct CheckStatus {
    pub status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckStatus {
    pub fn from_probe(healthy: bool, ok_message: &str, error_message: &str) -> Self {
        if healthy {
            Self {
                status: "ok".to_string(),
                message: Some(ok_message.to_string()),
            }
        } else {
            Self {
                status: "error".to_string(),
                message: Some(error_message.to_string()),
            }
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}
