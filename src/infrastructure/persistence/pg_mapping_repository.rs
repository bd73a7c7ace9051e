//! PostgreSQL implementation of the mapping repository.

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

use crate::domain::entities::{Mapping, NewMapping};
use crate::domain::repositories::MappingRepository;
use crate::error::AppError;

const MAPPING_COLUMNS: &str =
    "id, short_id, long_url, user_id, click_count, created_at, updated_at";

/// PostgreSQL repository for the `urls` table.
///
/// Uses bound parameters for every query. Uniqueness of `short_id` is left
/// to the `urls_short_id_key` constraint.
pub struct PgMappingRepository {
    pool: Arc<PgPool>,
}

impl PgMappingRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MappingRepository for PgMappingRepository {
    async fn exists(&self, short_id: &str) -> Result<bool, AppError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM urls WHERE short_id = $1)")
                .bind(short_id)
                .fetch_one(self.pool.as_ref())
                .await?;

        Ok(exists)
    }

    async fn create(&self, new_mapping: NewMapping) -> Result<Mapping, AppError> {
        let mapping = sqlx::query_as::<_, Mapping>(&format!(
            r#"
            INSERT INTO urls (short_id, long_url, user_id)
            VALUES ($1, $2, $3)
            RETURNING {MAPPING_COLUMNS}
            "#
        ))
        .bind(&new_mapping.short_id)
        .bind(&new_mapping.long_url)
        .bind(new_mapping.owner_id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(mapping)
    }

    async fn find_by_short_id(&self, short_id: &str) -> Result<Option<Mapping>, AppError> {
        let mapping = sqlx::query_as::<_, Mapping>(&format!(
            "SELECT {MAPPING_COLUMNS} FROM urls WHERE short_id = $1"
        ))
        .bind(short_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(mapping)
    }

    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Mapping>, AppError> {
        let mappings = sqlx::query_as::<_, Mapping>(&format!(
            r#"
            SELECT {MAPPING_COLUMNS}
            FROM urls
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(owner_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(mappings)
    }

    async fn delete(&self, short_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM urls WHERE short_id = $1")
            .bind(short_id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn increment_clicks(&self, short_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE urls
            SET click_count = click_count + 1, updated_at = NOW()
            WHERE short_id = $1
            "#,
        )
        .bind(short_id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn existing_short_ids(&self, short_ids: &[String]) -> Result<Vec<String>, AppError> {
        if short_ids.is_empty() {
            return Ok(Vec::new());
        }

        let existing: Vec<String> =
            sqlx::query_scalar("SELECT short_id FROM urls WHERE short_id = ANY($1)")
                .bind(short_ids)
                .fetch_all(self.pool.as_ref())
                .await?;

        Ok(existing)
    }

    async fn totals(&self) -> Result<(i64, i64), AppError> {
        let totals: (i64, i64) =
            sqlx::query_as("SELECT COUNT(*), COALESCE(SUM(click_count), 0)::BIGINT FROM urls")
                .fetch_one(self.pool.as_ref())
                .await?;

        Ok(totals)
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }
}
