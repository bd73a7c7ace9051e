//! Top-level routers of the two HTTP services.
//!
//! # Writer
//!
//! - `/urls`, `/urls/mine`, `/urls/{shortId}`, `/stats/{shortId}` - see [`crate::api::routes`]
//! - `GET /health` - Database and broker checks
//!
//! # Redirector
//!
//! - `GET /{shortId}` - Cache-only redirect
//! - `GET /health`    - Cache and broker checks
//!
//! Both routers carry request tracing and trailing-slash normalization.

use axum::Router;
use axum::routing::get;
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};

use crate::api;
use crate::api::handlers::{redirect_handler, redirector_health_handler, writer_health_handler};
use crate::api::middleware::tracing;
use crate::state::{RedirectorState, WriterState};

/// Writer routes with tracing, without path normalization.
pub fn writer_routes(state: WriterState) -> Router {
    api::routes::mapping_routes()
        .route("/health", get(writer_health_handler))
        .with_state(state)
        .layer(tracing::layer())
}

/// Redirector routes with tracing, without path normalization.
pub fn redirector_routes(state: RedirectorState) -> Router {
    Router::new()
        .route("/health", get(redirector_health_handler))
        .route("/{short_id}", get(redirect_handler))
        .with_state(state)
        .layer(tracing::layer())
}

/// The writer service.
pub fn writer_router(state: WriterState) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(writer_routes(state))
}

/// The redirector service.
pub fn redirector_router(state: RedirectorState) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(redirector_routes(state))
}
