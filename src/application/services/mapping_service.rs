//! Identifier generation and the write path.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use crate::domain::entities::{DeleteOutcome, Mapping, NewMapping};
use crate::domain::events::{MappingCreated, MappingDeleted};
use crate::domain::repositories::MappingRepository;
use crate::error::AppError;
use crate::infrastructure::broker::{EventPublisher, publish_event};
use crate::utils::code_generator::{DEFAULT_CODE_LENGTH, generate_code};
use crate::utils::url_normalizer::normalize_url;

/// Short code length and collision retry bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodePolicy {
    pub length: usize,
    pub max_attempts: usize,
}

impl Default for CodePolicy {
    fn default() -> Self {
        Self {
            length: DEFAULT_CODE_LENGTH,
            max_attempts: 3,
        }
    }
}

/// Owns the system of record for mappings and announces changes on the broker.
///
/// The insert is the durability boundary: once [`MappingRepository::create`]
/// returns, nothing downstream can undo it. Event publishing after a commit
/// is best-effort and only logged on failure.
pub struct MappingService {
    repository: Arc<dyn MappingRepository>,
    publisher: Arc<dyn EventPublisher>,
    policy: CodePolicy,
    public_base_url: String,
}

impl MappingService {
    pub fn new(
        repository: Arc<dyn MappingRepository>,
        publisher: Arc<dyn EventPublisher>,
        policy: CodePolicy,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            publisher,
            policy,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Creates a mapping under a freshly generated short code.
    ///
    /// # Code Generation
    ///
    /// Each attempt generates a random code, checks it against the durable
    /// store and inserts it. A code that already exists, or that loses an
    /// insert race to a concurrent writer (unique violation), costs one
    /// attempt. After `max_attempts` collisions the request fails instead of
    /// looping.
    ///
    /// `MappingCreated` is published from a detached task once the row is
    /// committed; the caller never waits on the broker.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for URLs that are not absolute HTTP(S) URLs.
    /// Returns [`AppError::Unauthorized`] when `owner_id` names no known user.
    /// Returns a `short_code_exhausted` [`AppError::Conflict`] when every attempt collided.
    /// Returns [`AppError::Internal`] on database errors.
    pub async fn create_mapping(
        &self,
        long_url: &str,
        owner_id: Option<i64>,
    ) -> Result<Mapping, AppError> {
        let long_url = normalize_url(long_url).map_err(|e| {
            AppError::bad_request("Invalid URL format", json!({ "reason": e.to_string() }))
        })?;

        let mapping = self.insert_with_fresh_code(long_url, owner_id).await?;
        info!(short_id = %mapping.short_id, owner_id = ?mapping.owner_id, "Mapping created");

        let event = MappingCreated {
            short_id: mapping.short_id.clone(),
            long_url: mapping.long_url.clone(),
        };
        let publisher = Arc::clone(&self.publisher);

        tokio::spawn(async move {
            if let Err(e) = publish_event(publisher.as_ref(), &event).await {
                warn!(
                    short_id = %event.short_id,
                    error = %e,
                    "MappingCreated not published; mapping will miss the cache until republished"
                );
            }
        });

        Ok(mapping)
    }

    async fn insert_with_fresh_code(
        &self,
        long_url: String,
        owner_id: Option<i64>,
    ) -> Result<Mapping, AppError> {
        for attempt in 1..=self.policy.max_attempts {
            let short_id = generate_code(self.policy.length);

            if self.repository.exists(&short_id).await? {
                warn!(attempt, short_id = %short_id, "Short code collision");
                continue;
            }

            let new_mapping = NewMapping {
                short_id,
                long_url: long_url.clone(),
                owner_id,
            };

            match self.repository.create(new_mapping).await {
                Ok(mapping) => return Ok(mapping),
                Err(e) if e.is_unique_violation() => {
                    warn!(attempt, "Short code lost an insert race");
                }
                Err(e) if e.is_foreign_key_violation() => {
                    warn!(owner_id, "Create refused for unknown user");
                    return Err(AppError::unauthorized(
                        "Unknown user",
                        json!({ "ownerId": owner_id }),
                    ));
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::short_code_exhausted(self.policy.max_attempts))
    }

    /// Deletes a mapping on behalf of its owner.
    ///
    /// Existence is checked before ownership, so a non-owner probing an
    /// unknown code sees [`DeleteOutcome::NotFound`]. Only a confirmed row
    /// removal publishes `MappingDeleted`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors only.
    pub async fn delete_mapping(
        &self,
        short_id: &str,
        requester_id: i64,
    ) -> Result<DeleteOutcome, AppError> {
        let Some(mapping) = self.repository.find_by_short_id(short_id).await? else {
            return Ok(DeleteOutcome::NotFound);
        };

        if !mapping.is_owned_by(requester_id) {
            warn!(short_id, requester_id, "Delete refused for non-owner");
            return Ok(DeleteOutcome::Forbidden);
        }

        if !self.repository.delete(short_id).await? {
            // Removed concurrently; the other delete published the event.
            return Ok(DeleteOutcome::NotFound);
        }
        info!(short_id, requester_id, "Mapping deleted");

        let event = MappingDeleted {
            short_id: short_id.to_string(),
        };
        if let Err(e) = publish_event(self.publisher.as_ref(), &event).await {
            warn!(short_id, error = %e, "MappingDeleted not published; reconciler will evict");
        }

        Ok(DeleteOutcome::Deleted)
    }

    /// Lists the requester's mappings, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    pub async fn list_mine(&self, owner_id: i64) -> Result<Vec<Mapping>, AppError> {
        self.repository.list_by_owner(owner_id).await
    }

    /// Looks up a mapping with its click counter.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    pub async fn stats(&self, short_id: &str) -> Result<Option<Mapping>, AppError> {
        self.repository.find_by_short_id(short_id).await
    }

    /// Re-emits `MappingCreated` for an existing mapping.
    ///
    /// Recovers mappings whose original event was lost. Safe to repeat
    /// because cache population is idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the mapping does not exist, or
    /// [`AppError::Internal`] if the broker did not confirm the publish.
    pub async fn republish(&self, short_id: &str) -> Result<Mapping, AppError> {
        let mapping = self
            .repository
            .find_by_short_id(short_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found("Short link not found", json!({ "shortId": short_id }))
            })?;

        let event = MappingCreated {
            short_id: mapping.short_id.clone(),
            long_url: mapping.long_url.clone(),
        };
        publish_event(self.publisher.as_ref(), &event).await?;
        info!(short_id, "MappingCreated republished");

        Ok(mapping)
    }

    /// Builds the public short URL for a code.
    pub fn full_short_url(&self, short_id: &str) -> String {
        format!("{}/{}", self.public_base_url, short_id)
    }

    /// Returns true if the durable store answers.
    pub async fn database_healthy(&self) -> bool {
        self.repository.ping().await.is_ok()
    }

    /// Returns true if the broker answers.
    pub async fn broker_healthy(&self) -> bool {
        self.publisher.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::{MAPPING_CREATED_QUEUE, MAPPING_DELETED_QUEUE};
    use crate::domain::repositories::MockMappingRepository;
    use crate::infrastructure::broker::{BrokerError, MemoryBroker};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::time::Duration;

    /// Publisher whose broker never answers.
    struct StalledPublisher;

    #[async_trait]
    impl EventPublisher for StalledPublisher {
        async fn publish_raw(&self, _queue: &str, _payload: Vec<u8>) -> Result<(), BrokerError> {
            std::future::pending().await
        }

        async fn health_check(&self) -> bool {
            false
        }
    }

    fn create_test_mapping(short_id: &str, url: &str, owner_id: Option<i64>) -> Mapping {
        Mapping {
            id: 1,
            short_id: short_id.to_string(),
            long_url: url.to_string(),
            owner_id,
            click_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn unique_violation() -> AppError {
        AppError::Conflict {
            code: "unique_violation",
            message: "Unique constraint violation".to_string(),
            details: json!({}),
        }
    }

    fn service(repo: MockMappingRepository, broker: &MemoryBroker) -> MappingService {
        MappingService::new(
            Arc::new(repo),
            Arc::new(broker.clone()),
            CodePolicy::default(),
            "http://localhost:3001/",
        )
    }

    #[tokio::test]
    async fn test_create_mapping_success_publishes_event() {
        let mut mock_repo = MockMappingRepository::new();
        mock_repo.expect_exists().times(1).returning(|_| Ok(false));
        mock_repo
            .expect_create()
            .withf(|m| m.short_id.len() == 11 && m.long_url == "http://example.com/a/b/c")
            .times(1)
            .returning(|m| Ok(create_test_mapping(&m.short_id, &m.long_url, m.owner_id)));

        let broker = MemoryBroker::new();
        let service = service(mock_repo, &broker);

        let mapping = service
            .create_mapping("http://example.com/a/b/c", None)
            .await
            .unwrap();

        assert_eq!(mapping.long_url, "http://example.com/a/b/c");
        assert!(broker.wait_for_publishes(1, Duration::from_secs(1)).await);
        let pending = broker.pending::<MappingCreated>().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].short_id, mapping.short_id);
    }

    #[tokio::test]
    async fn test_create_mapping_prepends_scheme() {
        let mut mock_repo = MockMappingRepository::new();
        mock_repo.expect_exists().returning(|_| Ok(false));
        mock_repo
            .expect_create()
            .withf(|m| m.long_url == "http://example.com/")
            .times(1)
            .returning(|m| Ok(create_test_mapping(&m.short_id, &m.long_url, m.owner_id)));

        let broker = MemoryBroker::new();
        let result = service(mock_repo, &broker)
            .create_mapping("example.com", Some(7))
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_create_mapping_invalid_url_touches_nothing() {
        let mut mock_repo = MockMappingRepository::new();
        mock_repo.expect_exists().times(0);
        mock_repo.expect_create().times(0);

        let broker = MemoryBroker::new();
        let result = service(mock_repo, &broker)
            .create_mapping("ftp://example.com/file", None)
            .await;

        assert!(matches!(result.unwrap_err(), AppError::Validation { .. }));
        assert_eq!(broker.depth(MAPPING_CREATED_QUEUE).await, 0);
    }

    #[tokio::test]
    async fn test_create_mapping_retries_after_collision() {
        let mut mock_repo = MockMappingRepository::new();
        let mut seen = 0;
        mock_repo.expect_exists().times(2).returning(move |_| {
            seen += 1;
            Ok(seen == 1)
        });
        mock_repo
            .expect_create()
            .times(1)
            .returning(|m| Ok(create_test_mapping(&m.short_id, &m.long_url, m.owner_id)));

        let broker = MemoryBroker::new();
        let result = service(mock_repo, &broker)
            .create_mapping("https://example.com", None)
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_create_mapping_three_collisions_is_conflict() {
        let mut mock_repo = MockMappingRepository::new();
        mock_repo.expect_exists().times(3).returning(|_| Ok(true));
        mock_repo.expect_create().times(0);

        let broker = MemoryBroker::new();
        let err = service(mock_repo, &broker)
            .create_mapping("https://example.com", None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Conflict {
                code: "short_code_exhausted",
                ..
            }
        ));
        assert_eq!(broker.depth(MAPPING_CREATED_QUEUE).await, 0);
    }

    #[tokio::test]
    async fn test_insert_race_counts_as_collision() {
        let mut mock_repo = MockMappingRepository::new();
        mock_repo.expect_exists().times(3).returning(|_| Ok(false));
        mock_repo
            .expect_create()
            .times(3)
            .returning(|_| Err(unique_violation()));

        let broker = MemoryBroker::new();
        let err = service(mock_repo, &broker)
            .create_mapping("https://example.com", None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Conflict {
                code: "short_code_exhausted",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_create_mapping_survives_publish_failure() {
        let mut mock_repo = MockMappingRepository::new();
        mock_repo.expect_exists().returning(|_| Ok(false));
        mock_repo
            .expect_create()
            .times(1)
            .returning(|m| Ok(create_test_mapping(&m.short_id, &m.long_url, m.owner_id)));

        let broker = MemoryBroker::new();
        broker.set_publish_failure(true);

        let result = service(mock_repo, &broker)
            .create_mapping("https://example.com", None)
            .await;

        assert!(result.is_ok());
        assert!(broker.wait_for_publishes(1, Duration::from_secs(1)).await);
        assert_eq!(broker.depth(MAPPING_CREATED_QUEUE).await, 0);
    }

    #[tokio::test]
    async fn test_create_mapping_does_not_wait_for_broker() {
        let mut mock_repo = MockMappingRepository::new();
        mock_repo.expect_exists().returning(|_| Ok(false));
        mock_repo
            .expect_create()
            .times(1)
            .returning(|m| Ok(create_test_mapping(&m.short_id, &m.long_url, m.owner_id)));

        let service = MappingService::new(
            Arc::new(mock_repo),
            Arc::new(StalledPublisher),
            CodePolicy::default(),
            "http://localhost:3001",
        );

        let result = tokio::time::timeout(
            Duration::from_secs(1),
            service.create_mapping("https://example.com", Some(1)),
        )
        .await
        .expect("create waited on the broker");

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_create_mapping_unknown_owner_is_unauthorized() {
        let mut mock_repo = MockMappingRepository::new();
        mock_repo.expect_exists().times(1).returning(|_| Ok(false));
        mock_repo.expect_create().times(1).returning(|_| {
            Err(AppError::Conflict {
                code: "foreign_key_violation",
                message: "Foreign key violation".to_string(),
                details: json!({}),
            })
        });

        let broker = MemoryBroker::new();
        let err = service(mock_repo, &broker)
            .create_mapping("https://example.com", Some(999))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Unauthorized { .. }));
        assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);
        assert_eq!(broker.publish_attempts(), 0);
    }

    #[tokio::test]
    async fn test_create_mapping_database_error_propagates() {
        let mut mock_repo = MockMappingRepository::new();
        mock_repo
            .expect_exists()
            .times(1)
            .returning(|_| Err(AppError::internal("Database error", json!({}))));

        let broker = MemoryBroker::new();
        let err = service(mock_repo, &broker)
            .create_mapping("https://example.com", None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Internal { .. }));
    }

    #[tokio::test]
    async fn test_delete_not_found() {
        let mut mock_repo = MockMappingRepository::new();
        mock_repo
            .expect_find_by_short_id()
            .times(1)
            .returning(|_| Ok(None));
        mock_repo.expect_delete().times(0);

        let broker = MemoryBroker::new();
        let outcome = service(mock_repo, &broker)
            .delete_mapping("missing", 1)
            .await
            .unwrap();

        assert_eq!(outcome, DeleteOutcome::NotFound);
        assert_eq!(broker.depth(MAPPING_DELETED_QUEUE).await, 0);
    }

    #[tokio::test]
    async fn test_delete_by_non_owner_is_forbidden() {
        let mut mock_repo = MockMappingRepository::new();
        mock_repo
            .expect_find_by_short_id()
            .returning(|id| Ok(Some(create_test_mapping(id, "https://example.com", Some(1)))));
        mock_repo.expect_delete().times(0);

        let broker = MemoryBroker::new();
        let outcome = service(mock_repo, &broker)
            .delete_mapping("abc", 2)
            .await
            .unwrap();

        assert_eq!(outcome, DeleteOutcome::Forbidden);
        assert_eq!(broker.depth(MAPPING_DELETED_QUEUE).await, 0);
    }

    #[tokio::test]
    async fn test_delete_anonymous_mapping_is_forbidden() {
        let mut mock_repo = MockMappingRepository::new();
        mock_repo
            .expect_find_by_short_id()
            .returning(|id| Ok(Some(create_test_mapping(id, "https://example.com", None))));
        mock_repo.expect_delete().times(0);

        let broker = MemoryBroker::new();
        let outcome = service(mock_repo, &broker)
            .delete_mapping("abc", 1)
            .await
            .unwrap();

        assert_eq!(outcome, DeleteOutcome::Forbidden);
    }

    #[tokio::test]
    async fn test_delete_by_owner_publishes_event() {
        let mut mock_repo = MockMappingRepository::new();
        mock_repo
            .expect_find_by_short_id()
            .returning(|id| Ok(Some(create_test_mapping(id, "https://example.com", Some(1)))));
        mock_repo
            .expect_delete()
            .withf(|id| id == "abc")
            .times(1)
            .returning(|_| Ok(true));

        let broker = MemoryBroker::new();
        let outcome = service(mock_repo, &broker)
            .delete_mapping("abc", 1)
            .await
            .unwrap();

        assert_eq!(outcome, DeleteOutcome::Deleted);
        let pending = broker.pending::<MappingDeleted>().await;
        assert_eq!(pending, vec![MappingDeleted { short_id: "abc".to_string() }]);
    }

    #[tokio::test]
    async fn test_delete_survives_publish_failure() {
        let mut mock_repo = MockMappingRepository::new();
        mock_repo
            .expect_find_by_short_id()
            .returning(|id| Ok(Some(create_test_mapping(id, "https://example.com", Some(1)))));
        mock_repo.expect_delete().times(1).returning(|_| Ok(true));

        let broker = MemoryBroker::new();
        broker.set_publish_failure(true);

        let outcome = service(mock_repo, &broker)
            .delete_mapping("abc", 1)
            .await
            .unwrap();

        assert_eq!(outcome, DeleteOutcome::Deleted);
    }

    #[tokio::test]
    async fn test_republish_missing_mapping() {
        let mut mock_repo = MockMappingRepository::new();
        mock_repo.expect_find_by_short_id().returning(|_| Ok(None));

        let broker = MemoryBroker::new();
        let err = service(mock_repo, &broker)
            .republish("missing")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[test]
    fn test_full_short_url_trims_trailing_slash() {
        let broker = MemoryBroker::new();
        let service = service(MockMappingRepository::new(), &broker);
        assert_eq!(service.full_short_url("abc"), "http://localhost:3001/abc");
    }
}
