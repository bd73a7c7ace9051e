//! Periodic sweep that evicts cache entries without a durable mapping.
//!
//! Covers `MappingDeleted` events that were lost outright. Entries are only
//! evicted when the durable store positively reports them missing, so a
//! database error aborts the sweep without touching the cache.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::domain::repositories::MappingRepository;
use crate::infrastructure::cache::CacheService;

/// Number of short ids checked against the store per query.
const BATCH_SIZE: usize = 500;

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub scanned: usize,
    pub orphaned: usize,
    pub evicted: usize,
}

pub struct ReconcileService {
    repository: Arc<dyn MappingRepository>,
    cache: Arc<dyn CacheService>,
}

impl ReconcileService {
    pub fn new(repository: Arc<dyn MappingRepository>, cache: Arc<dyn CacheService>) -> Self {
        Self { repository, cache }
    }

    /// Lists cache entries whose short id no longer exists in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if either the cache or the store fails.
    pub async fn find_orphans(&self) -> anyhow::Result<(usize, Vec<String>)> {
        let cached = self.cache.cached_short_ids().await?;
        let mut orphans = Vec::new();

        for batch in cached.chunks(BATCH_SIZE) {
            let existing = self.repository.existing_short_ids(batch).await?;
            orphans.extend(
                batch
                    .iter()
                    .filter(|id| !existing.contains(id))
                    .cloned(),
            );
        }

        Ok((cached.len(), orphans))
    }

    /// Runs one full sweep and evicts every orphan found.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan or a store lookup fails. Individual
    /// eviction failures are logged and skipped; the next sweep retries them.
    pub async fn sweep(&self) -> anyhow::Result<ReconcileReport> {
        let (scanned, orphans) = self.find_orphans().await?;
        let mut report = ReconcileReport {
            scanned,
            orphaned: orphans.len(),
            evicted: 0,
        };

        for short_id in &orphans {
            match self.cache.invalidate(short_id).await {
                Ok(_) => {
                    report.evicted += 1;
                    info!(short_id = %short_id, "Evicted orphaned cache entry");
                }
                Err(e) => warn!(short_id = %short_id, error = %e, "Failed to evict orphan"),
            }
        }

        metrics::counter!("reconciler_evictions_total").increment(report.evicted as u64);
        Ok(report)
    }

    /// Sweeps every `interval` until `shutdown` flips to true.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = interval.as_secs(), "Reconciler started");
        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.sweep().await {
                        Ok(report) => info!(
                            scanned = report.scanned,
                            orphaned = report.orphaned,
                            evicted = report.evicted,
                            "Reconciliation sweep finished"
                        ),
                        Err(e) => error!(error = %e, "Reconciliation sweep failed"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Reconciler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::NewMapping;
    use crate::domain::repositories::MockMappingRepository;
    use crate::error::AppError;
    use crate::infrastructure::cache::MemoryCache;
    use crate::infrastructure::persistence::MemoryMappingRepository;
    use serde_json::json;

    #[tokio::test]
    async fn test_sweep_evicts_only_orphans() {
        let repo = Arc::new(MemoryMappingRepository::new());
        repo.create(NewMapping {
            short_id: "live".to_string(),
            long_url: "https://example.com/live".to_string(),
            owner_id: None,
        })
        .await
        .unwrap();

        let cache = Arc::new(MemoryCache::new());
        cache.set_url("live", "https://example.com/live").await.unwrap();
        cache.set_url("gone", "https://example.com/gone").await.unwrap();

        let service = ReconcileService::new(repo, cache.clone());
        let report = service.sweep().await.unwrap();

        assert_eq!(
            report,
            ReconcileReport {
                scanned: 2,
                orphaned: 1,
                evicted: 1
            }
        );
        assert_eq!(
            cache.get_url("live").await.unwrap().as_deref(),
            Some("https://example.com/live")
        );
        assert_eq!(cache.get_url("gone").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sweep_on_empty_cache_queries_nothing() {
        let mut mock_repo = MockMappingRepository::new();
        mock_repo.expect_existing_short_ids().times(0);

        let service = ReconcileService::new(Arc::new(mock_repo), Arc::new(MemoryCache::new()));
        assert_eq!(service.sweep().await.unwrap(), ReconcileReport::default());
    }

    #[tokio::test]
    async fn test_store_error_aborts_without_evicting() {
        let mut mock_repo = MockMappingRepository::new();
        mock_repo
            .expect_existing_short_ids()
            .returning(|_| Err(AppError::internal("Database error", json!({}))));

        let cache = Arc::new(MemoryCache::new());
        cache.set_url("abc", "https://example.com").await.unwrap();

        let service = ReconcileService::new(Arc::new(mock_repo), cache.clone());
        assert!(service.sweep().await.is_err());
        assert_eq!(cache.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let service = ReconcileService::new(
            Arc::new(MemoryMappingRepository::new()),
            Arc::new(MemoryCache::new()),
        );
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            service.run(Duration::from_secs(3600), rx).await;
        });
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
