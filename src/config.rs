//! Configuration management
//! Load settings from .env file into one explicit struct, built once at
//! process start and passed to each component.

use anyhow::{Context, Result};

/// Everything the API server and the backfill pipeline need.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Storage
    pub database_url: String,

    // Price oracle
    pub coingecko_api_key: String,

    // Event feed (GraphQL endpoint)
    pub events_url: String,

    // Optional webhook for backfill reports; unset disables delivery
    pub webhook_url: Option<String>,

    // API server
    pub bind_addr: String,

    // Backfill tuning
    pub batch_size: usize,
    pub batch_delay_secs: u64,
    pub fetch_concurrency: usize,
}

pub fn load_config() -> Result<AppConfig> {
    dotenv::dotenv().ok();

    Ok(AppConfig {
        database_url: std::env::var("DATABASE_URL").context("DATABASE_URL not set")?,
        coingecko_api_key: std::env::var("COINGECKO_API_KEY")
            .context("COINGECKO_API_KEY not set")?,
        events_url: std::env::var("EVENTS_URL").context("EVENTS_URL not set")?,
        webhook_url: std::env::var("WEBHOOK_URL").ok().filter(|s| !s.is_empty()),
        bind_addr: env_or("BIND_ADDR", "0.0.0.0:3000"),

        batch_size: env_or("BATCH_SIZE", "30").parse().context("bad BATCH_SIZE")?,
        batch_delay_secs: env_or("BATCH_DELAY_SECS", "62")
            .parse()
            .context("bad BATCH_DELAY_SECS")?,
        fetch_concurrency: env_or("FETCH_CONCURRENCY", "10")
            .parse()
            .context("bad FETCH_CONCURRENCY")?,
    })
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
