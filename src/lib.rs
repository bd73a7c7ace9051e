//! # URL Pipeline
//!
//! The write path and cache-invalidation pipeline of a URL shortener, split
//! into independent services that only share PostgreSQL, a Redis cache and
//! Redis-backed queues.
//!
//! ## Architecture
//!
//! - **Domain Layer** ([`domain`]) - Mapping entity, event contracts, repository trait
//! - **Application Layer** ([`application`]) - Writer, redirector, reconciler and queue consumers
//! - **Infrastructure Layer** ([`infrastructure`]) - PostgreSQL, Redis cache, Redis queues
//! - **API Layer** ([`api`]) - HTTP handlers, DTOs, identity extraction
//!
//! ## Data Flow
//!
//! ```text
//! POST /urls        -> writer (insert) -> mapping-created -> cache populator -> SET url:{id}
//! GET /{id}         -> redirector (GET url:{id}) -> 302 + click-recorded -> click aggregator -> +1
//! DELETE /urls/{id} -> writer (delete) -> mapping-deleted -> deletion propagator -> DEL url:{id}
//! ```
//!
//! Delivery is at-least-once and every consumer is idempotent. The cache is
//! eventually consistent with the database; the redirector never reads the
//! database.
//!
//! ## Configuration
//!
//! Loaded from environment variables via [`config::Config`].

pub mod api;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod state;
pub mod utils;

pub mod config;
pub mod server;
pub mod telemetry;

pub mod routes;

pub use error::AppError;
pub use state::{RedirectorState, WriterState};

/// Commonly used types for external consumers.
///
/// Re-exports frequently used types to simplify imports for library users
/// and integration tests.
pub mod prelude {
    pub use crate::application::consumers::{
        CachePopulator, ClickAggregator, DeletionPropagator, Disposition, MessageHandler,
    };
    pub use crate::application::services::{MappingService, RedirectService, Resolution};
    pub use crate::domain::entities::{DeleteOutcome, Mapping, NewMapping};
    pub use crate::error::AppError;
    pub use crate::state::{RedirectorState, WriterState};
}
