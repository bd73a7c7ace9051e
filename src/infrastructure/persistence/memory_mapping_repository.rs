//! In-process mapping store for tests and local pipeline runs.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use tokio::sync::Mutex;

use crate::domain::entities::{Mapping, NewMapping};
use crate::domain::repositories::MappingRepository;
use crate::error::AppError;

/// A `HashMap`-backed store that enforces the same unique constraint as the
/// `urls` table and counts every query it serves.
#[derive(Default)]
pub struct MemoryMappingRepository {
    rows: Mutex<HashMap<String, Mapping>>,
    next_id: AtomicI64,
    queries: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryMappingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of repository calls made so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Makes every subsequent call fail as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn begin(&self) -> Result<(), AppError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::internal("Database error", json!({})));
        }
        Ok(())
    }
}

#[async_trait]
impl MappingRepository for MemoryMappingRepository {
    async fn exists(&self, short_id: &str) -> Result<bool, AppError> {
        self.begin()?;
        Ok(self.rows.lock().await.contains_key(short_id))
    }

    async fn create(&self, new_mapping: NewMapping) -> Result<Mapping, AppError> {
        self.begin()?;
        let mut rows = self.rows.lock().await;
        if rows.contains_key(&new_mapping.short_id) {
            return Err(AppError::Conflict {
                code: "unique_violation",
                message: "Unique constraint violation".to_string(),
                details: json!({ "constraint": "urls_short_id_key" }),
            });
        }

        let now = Utc::now();
        let mapping = Mapping {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            short_id: new_mapping.short_id,
            long_url: new_mapping.long_url,
            owner_id: new_mapping.owner_id,
            click_count: 0,
            created_at: now,
            updated_at: now,
        };
        rows.insert(mapping.short_id.clone(), mapping.clone());
        Ok(mapping)
    }

    async fn find_by_short_id(&self, short_id: &str) -> Result<Option<Mapping>, AppError> {
        self.begin()?;
        Ok(self.rows.lock().await.get(short_id).cloned())
    }

    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Mapping>, AppError> {
        self.begin()?;
        let mut owned: Vec<Mapping> = self
            .rows
            .lock()
            .await
            .values()
            .filter(|m| m.owner_id == Some(owner_id))
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(owned)
    }

    async fn delete(&self, short_id: &str) -> Result<bool, AppError> {
        self.begin()?;
        Ok(self.rows.lock().await.remove(short_id).is_some())
    }

    async fn increment_clicks(&self, short_id: &str) -> Result<bool, AppError> {
        self.begin()?;
        match self.rows.lock().await.get_mut(short_id) {
            Some(mapping) => {
                mapping.click_count += 1;
                mapping.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn existing_short_ids(&self, short_ids: &[String]) -> Result<Vec<String>, AppError> {
        self.begin()?;
        let rows = self.rows.lock().await;
        Ok(short_ids
            .iter()
            .filter(|id| rows.contains_key(id.as_str()))
            .cloned()
            .collect())
    }

    async fn totals(&self) -> Result<(i64, i64), AppError> {
        self.begin()?;
        let rows = self.rows.lock().await;
        let clicks = rows.values().map(|m| m.click_count).sum();
        Ok((rows.len() as i64, clicks))
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.begin()
    }
}
