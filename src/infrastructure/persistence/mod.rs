//! Durable-store repository implementations.
//!
//! - [`PgMappingRepository`] - PostgreSQL-backed system of record
//! - [`MemoryMappingRepository`] - in-process store for tests

pub mod memory_mapping_repository;
pub mod pg_mapping_repository;

pub use memory_mapping_repository::MemoryMappingRepository;
pub use pg_mapping_repository::PgMappingRepository;
