//! Domain layer containing business entities and contracts.
//!
//! Independent of infrastructure concerns: nothing here talks to Postgres,
//! Redis or HTTP.
//!
//! - [`entities`] - Core business data structures
//! - [`events`] - Queue names and event payloads shared by all services
//! - [`repositories`] - Data access trait definitions
//!
//! # Pipeline
//!
//! 1. The writer inserts a [`entities::Mapping`] and publishes [`events::MappingCreated`]
//! 2. The cache populator writes `url:{shortId}` into the cache
//! 3. The redirector serves hits from the cache and publishes [`events::ClickRecorded`]
//! 4. The click aggregator increments `click_count`
//! 5. Deletes publish [`events::MappingDeleted`], which the deletion propagator evicts

pub mod entities;
pub mod events;
pub mod repositories;
