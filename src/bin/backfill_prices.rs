//! USD Price Backfill
//!
//! Purpose:
//!     Drains the activity event feed for priceable (token, chainId,
//!     timestamp) triples, seeds placeholder rows, then resolves every row
//!     still missing a USD price in oracle-quota-sized batches. Runs to
//!     completion once per invocation; re-running is safe and only touches
//!     rows still null.
//!
//! Author: AI-Generated
//! Created: 2026-02-04
//!
//! Usage:
//!     cargo run --release --bin backfill-prices
//!     cargo run --release --bin backfill-prices -- --batch-size 10 --batch-delay-secs 10
//!
//! Notes:
//!     - Batch size and pause default to the oracle's published rate limit
//!     - A single row's fetch failure is counted, never fatal
//!     - Summary is posted to WEBHOOK_URL when configured

use anyhow::{Context, Result};
use clap::Parser;
use price_index::backfill::{BackfillPipeline, BackfillSettings};
use price_index::config::load_config;
use price_index::events::ActivityEventSource;
use price_index::notify::Notifier;
use price_index::oracle::OracleClient;
use price_index::rate_limit::FixedInterval;
use price_index::store::PgStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

// ── CLI Arguments ───────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "backfill-prices", about = "Backfill missing USD prices from the oracle")]
struct Args {
    /// Rows per batch (default: BATCH_SIZE env or oracle quota)
    #[arg(long)]
    batch_size: Option<usize>,

    /// Pause between batches in seconds (default: BATCH_DELAY_SECS env)
    #[arg(long)]
    batch_delay_secs: Option<u64>,

    /// Concurrent fetches within a batch (default: FETCH_CONCURRENCY env)
    #[arg(long)]
    concurrency: Option<usize>,
}

// ── Main ────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let config = load_config()?;

    let settings = BackfillSettings {
        batch_size: args.batch_size.unwrap_or(config.batch_size),
        fetch_concurrency: args.concurrency.unwrap_or(config.fetch_concurrency),
    };
    let batch_delay = Duration::from_secs(
        args.batch_delay_secs.unwrap_or(config.batch_delay_secs),
    );

    info!("===========================================");
    info!("   USD Price Backfill");
    info!("===========================================");
    info!("Batch size: {} rows, delay: {}s", settings.batch_size, batch_delay.as_secs());
    info!("Fetch concurrency: {}", settings.fetch_concurrency);

    let store = PgStore::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    store.migrate().await.context("Failed to run migration")?;

    let pipeline = BackfillPipeline::new(
        Arc::new(store),
        Arc::new(OracleClient::new(&config.coingecko_api_key)),
        Arc::new(ActivityEventSource::new(&config.events_url)),
        Arc::new(FixedInterval::new(batch_delay)),
        Notifier::new(config.webhook_url.clone()),
        settings,
    );

    let start = std::time::Instant::now();
    let report = pipeline.run().await.context("Backfill run failed")?;

    // Summary
    info!("===========================================");
    info!("   Backfill Complete");
    info!("===========================================");
    info!("Total records:    {}", report.total_records);
    info!("Missing prices:   {}", report.missing_prices);
    info!("Attempted:        {}", report.attempted);
    info!("Succeeded:        {}", report.succeeded);
    info!("Errors:           {}", report.errors);
    info!("Seed failures:    {}", report.seed_failures);
    info!("Batches:          {}", report.batches);
    info!("Duration:         {:.1}s", start.elapsed().as_secs_f64());

    Ok(())
}
