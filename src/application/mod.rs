//! Application layer: the write path, the redirect path and the queue consumers.
//!
//! Services depend on repository, cache and broker traits only, so every
//! piece runs unchanged against the in-memory implementations in tests.
//!
//! - [`services::MappingService`] - Short code allocation, deletion, listing
//! - [`services::RedirectService`] - Cache-only resolution and click events
//! - [`services::ReconcileService`] - Orphaned cache entry sweep
//! - [`consumers`] - Cache populator, click aggregator, deletion propagator

pub mod consumers;
pub mod services;
