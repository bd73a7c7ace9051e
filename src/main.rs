//! Entry point for every pipeline service.
//!
//! ```bash
//! url-pipeline writer
//! url-pipeline redirector
//! url-pipeline cache-populator
//! url-pipeline click-aggregator
//! url-pipeline deletion-propagator
//! url-pipeline reconciler
//! ```
//!
//! Each subcommand is meant to run as its own process; scale consumers by
//! starting more processes with distinct `WORKER_ID`s.

use anyhow::Result;
use clap::{Parser, Subcommand};

use url_pipeline::config::load_from_env;
use url_pipeline::server;
use url_pipeline::telemetry::init_tracing;

/// Event-driven URL shortening pipeline.
#[derive(Parser)]
#[command(name = "url-pipeline")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    service: Service,
}

#[derive(Subcommand)]
enum Service {
    /// Create, list and delete mappings (HTTP, LISTEN)
    Writer,
    /// Resolve short codes from the cache (HTTP, REDIRECT_LISTEN)
    Redirector,
    /// Consume mapping-created and fill the cache
    CachePopulator,
    /// Consume click-recorded and increment counters
    ClickAggregator,
    /// Consume mapping-deleted and evict cache entries
    DeletionPropagator,
    /// Periodically evict cache entries without a mapping
    Reconciler,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = load_from_env()?;

    init_tracing(&config.log_level, &config.log_format);
    config.print_summary();

    match cli.service {
        Service::Writer => server::run_writer(config).await,
        Service::Redirector => server::run_redirector(config).await,
        Service::CachePopulator => server::run_cache_populator(config).await,
        Service::ClickAggregator => server::run_click_aggregator(config).await,
        Service::DeletionPropagator => server::run_deletion_propagator(config).await,
        Service::Reconciler => server::run_reconciler(config).await,
    }
}
