//! Handlers for health check endpoints.

use axum::{Json, extract::State, http::StatusCode};

use crate::api::dto::health::{CheckStatus, HealthChecks, HealthResponse};
use crate::state::{RedirectorState, WriterState};

type HealthResult = Result<Json<HealthResponse>, (StatusCode, Json<HealthResponse>)>;

fn respond(checks: HealthChecks) -> HealthResult {
    let all_healthy = checks.all_ok();

    let response = HealthResponse {
        status: if all_healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks,
    };

    if all_healthy {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

fn broker_check(healthy: bool) -> CheckStatus {
    CheckStatus::from_probe(healthy, "Broker connected", "Broker connection failed")
}

/// Returns writer health.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response Codes
///
/// - **200 OK**: Database and broker reachable
/// - **503 Service Unavailable**: One or more components degraded
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "checks": {
///     "database": { "status": "ok", "message": "Database connected" },
///     "broker": { "status": "ok", "message": "Broker connected" }
///   }
/// }
/// ```
pub async fn writer_health_handler(State(state): State<WriterState>) -> HealthResult {
    let (database, broker) = tokio::join!(
        state.mapping_service.database_healthy(),
        state.mapping_service.broker_healthy()
    );

    respond(HealthChecks {
        database: Some(CheckStatus::from_probe(
            database,
            "Database connected",
            "Database connection failed",
        )),
        cache: None,
        broker: broker_check(broker),
    })
}

/// Returns redirector health.
///
/// # Endpoint
///
/// `GET /health`
///
/// Same shape as the writer's, with `cache` in place of `database`.
pub async fn redirector_health_handler(State(state): State<RedirectorState>) -> HealthResult {
    let (cache, broker) = tokio::join!(
        state.redirect_service.cache_healthy(),
        state.redirect_service.broker_healthy()
    );

    respond(HealthChecks {
        database: None,
        cache: Some(CheckStatus::from_probe(
            cache,
            "Redis connected",
            "Redis connection failed",
        )),
        broker: broker_check(broker),
    })
}
