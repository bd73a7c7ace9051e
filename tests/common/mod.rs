#![allow(dead_code)]

use axum_test::TestServer;
use std::sync::Arc;
use std::time::Duration;
use url_pipeline::application::consumers::{
    CachePopulator, ClickAggregator, DeletionPropagator, MessageHandler, process_next,
};
use url_pipeline::application::services::{CodePolicy, MappingService, RedirectService};
use url_pipeline::domain::events::{
    CLICK_RECORDED_QUEUE, MAPPING_CREATED_QUEUE, MAPPING_DELETED_QUEUE,
};
use url_pipeline::infrastructure::broker::{MemoryBroker, MemoryConsumer};
use url_pipeline::infrastructure::cache::MemoryCache;
use url_pipeline::infrastructure::persistence::MemoryMappingRepository;
use url_pipeline::routes::{redirector_routes, writer_routes};
use url_pipeline::state::{RedirectorState, WriterState};

pub const BASE_URL: &str = "http://sho.rt";

/// Every service of the pipeline wired against in-memory infrastructure.
pub struct Pipeline {
    pub repo: Arc<MemoryMappingRepository>,
    pub cache: Arc<MemoryCache>,
    pub broker: MemoryBroker,
    pub writer: TestServer,
    pub redirector: TestServer,
    populator: CachePopulator,
    aggregator: ClickAggregator,
    propagator: DeletionPropagator,
    created: MemoryConsumer,
    clicks: MemoryConsumer,
    deleted: MemoryConsumer,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::with_not_found_redirect(None)
    }

    pub fn with_not_found_redirect(not_found_redirect: Option<&str>) -> Self {
        let repo = Arc::new(MemoryMappingRepository::new());
        let cache = Arc::new(MemoryCache::new());
        let broker = MemoryBroker::new();

        let mapping_service = Arc::new(MappingService::new(
            repo.clone(),
            Arc::new(broker.clone()),
            CodePolicy::default(),
            BASE_URL,
        ));
        let redirect_service = Arc::new(RedirectService::new(
            cache.clone(),
            Arc::new(broker.clone()),
        ));

        let writer = TestServer::new(writer_routes(WriterState::new(mapping_service))).unwrap();
        let redirector = TestServer::new(redirector_routes(RedirectorState::new(
            redirect_service,
            not_found_redirect.map(str::to_string),
        )))
        .unwrap();

        Self {
            populator: CachePopulator::new(cache.clone()),
            aggregator: ClickAggregator::new(repo.clone()),
            propagator: DeletionPropagator::new(cache.clone()),
            created: broker.consumer(MAPPING_CREATED_QUEUE),
            clicks: broker.consumer(CLICK_RECORDED_QUEUE),
            deleted: broker.consumer(MAPPING_DELETED_QUEUE),
            repo,
            cache,
            broker,
            writer,
            redirector,
        }
    }

    pub async fn run_cache_populator(&self) -> usize {
        drain(&self.created, &self.populator).await
    }

    pub async fn run_click_aggregator(&self) -> usize {
        drain(&self.clicks, &self.aggregator).await
    }

    pub async fn run_deletion_propagator(&self) -> usize {
        drain(&self.deleted, &self.propagator).await
    }

    /// Waits for spawned click publishes to land on the queue.
    pub async fn wait_for_clicks(&self, expected: usize) {
        for _ in 0..100 {
            if self.broker.depth(CLICK_RECORDED_QUEUE).await >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {expected} click events");
    }

    /// Waits for spawned event publishes to finish, failed ones included.
    pub async fn wait_for_publishes(&self, expected: usize) {
        assert!(
            self.broker
                .wait_for_publishes(expected, Duration::from_millis(500))
                .await,
            "expected {expected} publishes"
        );
    }

    /// Creates a mapping over HTTP and returns its short id once its
    /// `MappingCreated` publish has finished.
    pub async fn create(&self, long_url: &str, owner: Option<&str>) -> String {
        let published = self.broker.publish_attempts();
        let mut request = self
            .writer
            .post("/urls")
            .json(&serde_json::json!({ "longUrl": long_url }));
        if let Some(owner) = owner {
            request = request.add_header("x-user-id", owner);
        }
        let response = request.await;
        assert_eq!(response.status_code(), 201);
        self.wait_for_publishes(published + 1).await;

        response.json::<serde_json::Value>()["shortId"]
            .as_str()
            .unwrap()
            .to_string()
    }
}

/// Processes messages until the queue is empty or a message is requeued.
pub async fn drain(consumer: &MemoryConsumer, handler: &dyn MessageHandler) -> usize {
    use url_pipeline::application::consumers::Disposition;

    let mut processed = 0;
    while let Some(disposition) = process_next(consumer, handler).await.unwrap() {
        processed += 1;
        if disposition == Disposition::Requeue {
            break;
        }
    }
    processed
}
