//! CLI administration tool for url-pipeline.
//!
//! Operator commands that act on the database, the cache and the queues
//! directly, without going through the HTTP services.
//!
//! # Usage
//!
//! ```bash
//! # Check database connection
//! cargo run --bin admin -- db check
//!
//! # Mapping and click totals
//! cargo run --bin admin -- stats
//!
//! # Re-emit MappingCreated for a mapping that never reached the cache
//! cargo run --bin admin -- republish aZ3kP9qLm2X
//!
//! # Evict cache entries whose mapping no longer exists
//! cargo run --bin admin -- reconcile
//!
//! # Pending and dead-lettered message counts, plus in-flight lists per worker
//! cargo run --bin admin -- queues
//!
//! # Return a retired worker's in-flight messages to their queues
//! cargo run --bin admin -- recover worker-3
//! ```
//!
//! # Environment Variables
//!
//! Same as the services; see `url_pipeline::config`.

use url_pipeline::application::services::{CodePolicy, MappingService, ReconcileService};
use url_pipeline::config::{Config, load_from_env};
use url_pipeline::domain::events::ALL_QUEUES;
use url_pipeline::domain::repositories::MappingRepository;
use url_pipeline::infrastructure::broker::{MessageConsumer, RedisConsumer, RedisPublisher};
use url_pipeline::infrastructure::cache::RedisCache;
use url_pipeline::infrastructure::connection::RedisHandle;
use url_pipeline::infrastructure::persistence::PgMappingRepository;
use url_pipeline::server::connect_database;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Confirm;
use sqlx::PgPool;
use std::sync::Arc;

/// CLI tool for operating url-pipeline.
#[derive(Parser)]
#[command(name = "admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level commands.
#[derive(Subcommand)]
enum Commands {
    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbAction,
    },

    /// Show mapping and click totals
    Stats,

    /// Re-publish MappingCreated for an existing mapping
    Republish {
        /// Short code of the mapping
        short_id: String,
    },

    /// Evict cache entries whose mapping no longer exists
    Reconcile {
        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Show queue depths
    Queues,

    /// Move a retired worker's in-flight messages back to their queues
    Recover {
        /// WORKER_ID of a consumer that is no longer running
        worker_id: String,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

/// Database operation subcommands.
#[derive(Subcommand)]
enum DbAction {
    /// Check database connection
    Check,

    /// Show database info
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = load_from_env()?;

    match cli.command {
        Commands::Db { action } => {
            let pool = connect_database(&config).await?;
            handle_db_action(action, &pool).await?;
        }
        Commands::Stats => handle_stats(&config).await?,
        Commands::Republish { short_id } => republish(&config, &short_id).await?,
        Commands::Reconcile { yes } => reconcile(&config, yes).await?,
        Commands::Queues => show_queues(&config).await?,
        Commands::Recover { worker_id, yes } => recover(&config, &worker_id, yes).await?,
    }

    Ok(())
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

/// Handles database diagnostic commands.
async fn handle_db_action(action: DbAction, pool: &PgPool) -> Result<()> {
    match action {
        DbAction::Check => {
            println!("{}", "🔍 Checking database connection...".bright_blue());

            sqlx::query("SELECT 1").fetch_one(pool).await?;

            println!("{}", "✅ Database connection OK".green().bold());
        }
        DbAction::Info => {
            println!("{}", "ℹ️  Database Information".bright_blue().bold());
            println!();

            let version: String = sqlx::query_scalar("SELECT version()")
                .fetch_one(pool)
                .await?;

            println!("  PostgreSQL: {}", version.bright_white());
            println!();
        }
    }

    Ok(())
}

/// Displays mapping and click totals from the database.
async fn handle_stats(config: &Config) -> Result<()> {
    println!("{}", "📊 Statistics".bright_blue().bold());
    println!();

    let pool = connect_database(config).await?;
    let (mappings, clicks) = PgMappingRepository::new(Arc::new(pool))
        .totals()
        .await
        .map_err(|e| anyhow::anyhow!("Database error: {}", e))?;

    println!(
        "  Mappings: {}",
        mappings.to_string().bright_green().bold()
    );
    println!("  Clicks:   {}", clicks.to_string().bright_green().bold());
    println!();

    Ok(())
}

/// Re-emits `MappingCreated` so the cache populator fills the entry again.
async fn republish(config: &Config, short_id: &str) -> Result<()> {
    println!("{}", "📣 Republish mapping".bright_blue().bold());
    println!();

    let pool = connect_database(config).await?;
    let publish = connect_redis("broker-publish", &config.broker_url, config).await?;

    let service = MappingService::new(
        Arc::new(PgMappingRepository::new(Arc::new(pool))),
        Arc::new(RedisPublisher::new(publish.clone())),
        CodePolicy::default(),
        config.public_base_url.clone(),
    );

    let mapping = service
        .republish(short_id)
        .await
        .map_err(|e| anyhow::anyhow!("Republish failed: {}", e))?;
    publish.close().await;

    println!("  Short id: {}", mapping.short_id.cyan());
    println!("  Long URL: {}", mapping.long_url.bright_white());
    println!();
    println!("{}", "✅ MappingCreated published".green().bold());
    println!();

    Ok(())
}

/// Runs one reconciliation sweep after listing what would be evicted.
///
/// # Safety
///
/// - Lists the orphans first
/// - Requires confirmation (default: No) unless `--yes`
async fn reconcile(config: &Config, skip_confirm: bool) -> Result<()> {
    println!("{}", "🧹 Reconcile cache".bright_blue().bold());
    println!();

    let pool = connect_database(config).await?;
    let cache_handle = connect_redis("cache", &config.redis_url, config).await?;

    let service = ReconcileService::new(
        Arc::new(PgMappingRepository::new(Arc::new(pool))),
        Arc::new(RedisCache::new(cache_handle.clone(), config.cache_ttl_seconds)),
    );

    let (scanned, orphans) = service.find_orphans().await?;
    println!(
        "  Cached entries: {}",
        scanned.to_string().bright_white().bold()
    );
    println!(
        "  Orphaned:       {}",
        orphans.len().to_string().yellow().bold()
    );

    if orphans.is_empty() {
        println!();
        println!("{}", "✅ Cache is consistent".green().bold());
        cache_handle.close().await;
        return Ok(());
    }

    println!();
    for short_id in orphans.iter().take(20) {
        println!("  {}", short_id.bright_black());
    }
    if orphans.len() > 20 {
        println!(
            "  {}",
            format!("... and {} more", orphans.len() - 20).bright_black()
        );
    }
    println!();

    if !skip_confirm {
        let confirmed = Confirm::new()
            .with_prompt("Evict these entries?")
            .default(false)
            .interact()?;

        if !confirmed {
            println!("{}", "❌ Cancelled".red());
            cache_handle.close().await;
            return Ok(());
        }
    }

    let report = service.sweep().await?;
    cache_handle.close().await;

    println!();
    println!(
        "{}",
        format!("✅ Evicted {} entries", report.evicted).green().bold()
    );
    println!();

    Ok(())
}

/// Prints pending and dead-lettered counts for every queue.
async fn show_queues(config: &Config) -> Result<()> {
    println!("{}", "📬 Queues".bright_blue().bold());
    println!();

    let handle = connect_redis("broker-publish", &config.broker_url, config).await?;
    let publisher = RedisPublisher::new(handle.clone());

    println!(
        "  {:<20} {:>10} {:>10}",
        "QUEUE".bold(),
        "PENDING".bold(),
        "DEAD".bold()
    );
    for queue in ALL_QUEUES {
        let depth = publisher.queue_depth(queue).await?;
        let dead = if depth.dead > 0 {
            depth.dead.to_string().red()
        } else {
            depth.dead.to_string().bright_black()
        };
        println!(
            "  {:<20} {:>10} {:>10}",
            queue.cyan(),
            depth.pending.to_string().bright_white(),
            dead
        );
    }
    println!();

    let mut any_inflight = false;
    for queue in ALL_QUEUES {
        for (worker_id, count) in publisher.inflight_workers(queue).await? {
            if !any_inflight {
                println!("  {}", "In flight:".bold());
                any_inflight = true;
            }
            println!(
                "  {:<20} {:<24} {:>5}",
                queue.cyan(),
                worker_id.yellow(),
                count.to_string().bright_white()
            );
        }
    }
    if any_inflight {
        println!();
    }

    handle.close().await;
    Ok(())
}

/// Returns every message held in flight by `worker_id` to the front of its queue.
///
/// # Safety
///
/// - Only for workers that are no longer running; a live worker would
///   have its current message delivered twice
/// - Requires confirmation (default: No) unless `--yes`
async fn recover(config: &Config, worker_id: &str, skip_confirm: bool) -> Result<()> {
    println!("{}", "♻️  Recover in-flight messages".bright_blue().bold());
    println!();

    let handle = connect_redis("broker-consume", &config.broker_url, config).await?;
    let publisher = RedisPublisher::new(handle.clone());

    let mut held = Vec::new();
    for queue in ALL_QUEUES {
        let count = publisher
            .inflight_workers(queue)
            .await?
            .into_iter()
            .find(|(id, _)| id == worker_id)
            .map_or(0, |(_, count)| count);
        if count > 0 {
            println!("  {:<20} {:>5}", queue.cyan(), count.to_string().bright_white());
            held.push(queue);
        }
    }

    if held.is_empty() {
        println!("{}", format!("✅ Nothing in flight for {worker_id}").green().bold());
        handle.close().await;
        return Ok(());
    }
    println!();

    if !skip_confirm {
        let confirmed = Confirm::new()
            .with_prompt(format!("Is {worker_id} stopped? Requeue its messages?"))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("{}", "❌ Cancelled".red());
            handle.close().await;
            return Ok(());
        }
    }

    let mut recovered = 0;
    for queue in held {
        recovered += RedisConsumer::new(handle.clone(), queue, worker_id)
            .recover()
            .await?;
    }
    handle.close().await;

    println!();
    println!(
        "{}",
        format!("✅ Requeued {recovered} messages").green().bold()
    );
    println!();

    Ok(())
}
