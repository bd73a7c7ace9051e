//! Process startup for each service.
//!
//! Every `run_*` function opens only the connections its service needs,
//! runs until SIGINT/SIGTERM and then closes them.
//!
//! | Service | Postgres | Cache | Broker publish | Broker consume |
//! |---|---|---|---|---|
//! | writer | ✓ | | ✓ | |
//! | redirector | | ✓ | ✓ | |
//! | cache-populator | | ✓ | | ✓ |
//! | click-aggregator | ✓ | | | ✓ |
//! | deletion-propagator | | ✓ | | ✓ |
//! | reconciler | ✓ | ✓ | | |

use crate::application::consumers::{
    CachePopulator, ClickAggregator, ConsumerSettings, DeletionPropagator, MessageHandler,
    run_consumer,
};
use crate::application::services::{CodePolicy, MappingService, ReconcileService, RedirectService};
use crate::config::Config;
use crate::domain::events::{CLICK_RECORDED_QUEUE, MAPPING_CREATED_QUEUE, MAPPING_DELETED_QUEUE};
use crate::infrastructure::broker::{RedisConsumer, RedisPublisher};
use crate::infrastructure::cache::RedisCache;
use crate::infrastructure::connection::RedisHandle;
use crate::infrastructure::persistence::PgMappingRepository;
use crate::routes::{redirector_router, writer_router};
use crate::state::{RedirectorState, WriterState};

use anyhow::{Context, Result};
use axum::extract::Request;
use axum::{Router, ServiceExt};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tower_http::normalize_path::NormalizePath;

/// Returns a receiver that flips to `true` on SIGINT or SIGTERM.
pub fn shutdown_channel() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("Shutdown signal received");
        let _ = tx.send(true);
    });

    rx
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Resolves once the shutdown receiver reports `true`.
async fn until_shutdown(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            break;
        }
    }
}

/// Opens the Postgres pool with the configured sizing.
///
/// # Errors
///
/// Returns an error if the database settings are missing or the pool cannot connect.
pub async fn connect_database(config: &Config) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout))
        .max_lifetime(Duration::from_secs(config.db_max_lifetime))
        .connect(config.require_database_url()?)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("✓ Connected to database");
    Ok(pool)
}

async fn connect_redis(
    name: &'static str,
    url: &str,
    config: &Config,
) -> Result<Arc<RedisHandle>> {
    let handle = RedisHandle::connect(name, url, config.broker_connect_attempts)
        .await
        .with_context(|| format!("Failed to connect {name}"))?;
    Ok(Arc::new(handle))
}

async fn serve(addr: &str, app: NormalizePath<Router>) -> Result<()> {
    let addr: SocketAddr = addr
        .parse()
        .with_context(|| format!("Invalid bind address '{addr}'"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(until_shutdown(shutdown_channel()))
        .await?;

    Ok(())
}

/// Runs the writer: mapping creation, deletion, listing and stats.
///
/// Applies pending migrations before accepting requests.
///
/// # Errors
///
/// Returns an error if the database or broker cannot be reached at startup,
/// or if the listener fails.
pub async fn run_writer(config: Config) -> Result<()> {
    let pool = connect_database(&config).await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations applied");

    let publish = connect_redis("broker-publish", &config.broker_url, &config).await?;

    let repository = Arc::new(PgMappingRepository::new(Arc::new(pool.clone())));
    let publisher = Arc::new(RedisPublisher::new(publish.clone()));
    let mapping_service = Arc::new(MappingService::new(
        repository,
        publisher,
        CodePolicy {
            length: config.short_code_length,
            max_attempts: config.max_generation_attempts,
        },
        config.public_base_url.clone(),
    ));

    let state = WriterState::new(mapping_service);
    let result = serve(&config.listen_addr, writer_router(state)).await;

    publish.close().await;
    pool.close().await;
    result
}

/// Runs the redirector. Never opens a database connection.
///
/// # Errors
///
/// Returns an error if the cache or broker cannot be reached at startup,
/// or if the listener fails.
pub async fn run_redirector(config: Config) -> Result<()> {
    let cache_handle = connect_redis("cache", &config.redis_url, &config).await?;
    let publish = connect_redis("broker-publish", &config.broker_url, &config).await?;

    let cache = Arc::new(RedisCache::new(cache_handle.clone(), config.cache_ttl_seconds));
    let publisher = Arc::new(RedisPublisher::new(publish.clone()));
    let redirect_service = Arc::new(RedirectService::new(cache, publisher));
    let state = RedirectorState::new(redirect_service, config.not_found_redirect.clone());

    let result = serve(&config.redirect_listen_addr, redirector_router(state)).await;

    publish.close().await;
    cache_handle.close().await;
    result
}

/// Drives one queue with `handler` until shutdown.
async fn run_queue_worker(
    config: &Config,
    queue: &'static str,
    handler: &dyn MessageHandler,
) -> Result<()> {
    let worker_id = config.require_worker_id()?;
    let consume = connect_redis("broker-consume", &config.broker_url, config).await?;
    let consumer = RedisConsumer::new(consume.clone(), queue, worker_id);
    let settings = ConsumerSettings {
        poll_interval: Duration::from_millis(config.consumer_poll_interval_ms),
        requeue_backoff: Duration::from_millis(config.requeue_backoff_ms),
    };

    tracing::info!(queue, worker_id, "Starting consumer");
    let result = run_consumer(&consumer, handler, settings, shutdown_channel()).await;

    consume.close().await;
    result.with_context(|| format!("Consumer on '{queue}' failed"))
}

/// Runs the cache populator on `mapping-created`.
///
/// # Errors
///
/// Returns an error if the cache or broker cannot be reached at startup.
pub async fn run_cache_populator(config: Config) -> Result<()> {
    let cache_handle = connect_redis("cache", &config.redis_url, &config).await?;
    let populator = CachePopulator::new(Arc::new(RedisCache::new(
        cache_handle.clone(),
        config.cache_ttl_seconds,
    )));

    let result = run_queue_worker(&config, MAPPING_CREATED_QUEUE, &populator).await;
    cache_handle.close().await;
    result
}

/// Runs the click aggregator on `click-recorded`.
///
/// # Errors
///
/// Returns an error if the database or broker cannot be reached at startup.
pub async fn run_click_aggregator(config: Config) -> Result<()> {
    let pool = connect_database(&config).await?;
    let aggregator = ClickAggregator::new(Arc::new(PgMappingRepository::new(Arc::new(
        pool.clone(),
    ))));

    let result = run_queue_worker(&config, CLICK_RECORDED_QUEUE, &aggregator).await;
    pool.close().await;
    result
}

/// Runs the deletion propagator on `mapping-deleted`.
///
/// # Errors
///
/// Returns an error if the cache or broker cannot be reached at startup.
pub async fn run_deletion_propagator(config: Config) -> Result<()> {
    let cache_handle = connect_redis("cache", &config.redis_url, &config).await?;
    let propagator = DeletionPropagator::new(Arc::new(RedisCache::new(
        cache_handle.clone(),
        config.cache_ttl_seconds,
    )));

    let result = run_queue_worker(&config, MAPPING_DELETED_QUEUE, &propagator).await;
    cache_handle.close().await;
    result
}

/// Runs the periodic reconciliation sweep.
///
/// # Errors
///
/// Returns an error if the database or cache cannot be reached at startup.
pub async fn run_reconciler(config: Config) -> Result<()> {
    let pool = connect_database(&config).await?;
    let cache_handle = connect_redis("cache", &config.redis_url, &config).await?;

    let service = ReconcileService::new(
        Arc::new(PgMappingRepository::new(Arc::new(pool.clone()))),
        Arc::new(RedisCache::new(cache_handle.clone(), config.cache_ttl_seconds)),
    );
    service
        .run(
            Duration::from_secs(config.reconcile_interval_seconds),
            shutdown_channel(),
        )
        .await;

    cache_handle.close().await;
    pool.close().await;
    Ok(())
}
