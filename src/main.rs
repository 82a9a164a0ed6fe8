//! USD Price Index API server
//!
//! Main entry point for the read path. Serves `GET /price` over the
//! durable price cache, falling back to the external oracle on a miss.
//! The companion backfill-prices binary keeps the cache populated so the
//! miss rate stays low.
//!
//! Author: AI-Generated
//! Created: 2026-02-04

use anyhow::{Context, Result};
use clap::Parser;
use price_index::config::load_config;
use price_index::oracle::OracleClient;
use price_index::resolver::CacheResolver;
use price_index::server::{router, AppState};
use price_index::store::PgStore;
use std::sync::Arc;
use tracing::info;

/// USD Price Index API
#[derive(Parser)]
#[command(name = "price-api")]
struct Args {
    /// Bind address override (otherwise BIND_ADDR from the environment)
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let config = load_config()?;
    let bind_addr = args.bind.unwrap_or_else(|| config.bind_addr.clone());

    info!("USD Price Index starting...");

    let store = PgStore::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    store.migrate().await.context("Failed to run migration")?;
    info!("Database connected");

    let oracle = OracleClient::new(&config.coingecko_api_key);
    let resolver = Arc::new(CacheResolver::new(Arc::new(store), Arc::new(oracle)));

    let app = router(AppState { resolver });

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
