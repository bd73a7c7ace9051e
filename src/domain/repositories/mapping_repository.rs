//! Repository trait for the durable mapping store.

use crate::domain::entities::{Mapping, NewMapping};
use crate::error::AppError;
use async_trait::async_trait;

/// Repository interface for the system of record.
///
/// The store's unique constraint on `short_id` and its atomic counter
/// increment are the only points of cross-request mutual exclusion; callers
/// never lock around these methods.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgMappingRepository`] - PostgreSQL implementation
/// - [`crate::infrastructure::persistence::MemoryMappingRepository`] - in-process store for tests
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MappingRepository: Send + Sync {
    /// Returns true if a mapping with this short id exists.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn exists(&self, short_id: &str) -> Result<bool, AppError>;

    /// Inserts a new mapping. A successful return is the durable commit point.
    ///
    /// # Errors
    ///
    /// Returns a `unique_violation` [`AppError::Conflict`] if another writer
    /// committed the same short id first (see [`AppError::is_unique_violation`]).
    /// Returns [`AppError::Internal`] on database errors.
    async fn create(&self, new_mapping: NewMapping) -> Result<Mapping, AppError>;

    /// Finds a mapping by short id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn find_by_short_id(&self, short_id: &str) -> Result<Option<Mapping>, AppError>;

    /// Lists mappings owned by `owner_id`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Mapping>, AppError>;

    /// Deletes the mapping row.
    ///
    /// Returns `Ok(false)` if nothing was deleted (already gone).
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn delete(&self, short_id: &str) -> Result<bool, AppError>;

    /// Atomically increments the click counter.
    ///
    /// Returns `Ok(false)` when the mapping no longer exists; that is an
    /// expected race with deletion, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn increment_clicks(&self, short_id: &str) -> Result<bool, AppError>;

    /// Returns the subset of `short_ids` that still exist.
    ///
    /// Used by the reconciliation sweep to detect orphaned cache entries.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn existing_short_ids(&self, short_ids: &[String]) -> Result<Vec<String>, AppError>;

    /// Counts all mappings and the sum of their click counters.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn totals(&self) -> Result<(i64, i64), AppError>;

    /// Cheap connectivity probe for health checks.
    async fn ping(&self) -> Result<(), AppError>;
}
