//! USD Price Index Library
//!
//! Durable (token, chainId, timestamp) -> USD price cache with two faces:
//! an on-demand read path that fetches from an external oracle on cache
//! miss, and an offline backfill pipeline that discovers priceable triples
//! from an activity event feed and resolves them in rate-limited batches.
//!
//! Author: AI-Generated
//! Created: 2026-02-04

pub mod backfill;
pub mod config;
pub mod error;
pub mod events;
pub mod notify;
pub mod oracle;
pub mod rate_limit;
pub mod resolver;
pub mod server;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use backfill::{BackfillPipeline, BackfillReport, BackfillSettings};
pub use config::{load_config, AppConfig};
pub use error::PriceError;
pub use events::{ActivityEventSource, EventFeed};
pub use notify::Notifier;
pub use oracle::{OracleClient, PriceQuote, PriceSource};
pub use resolver::CacheResolver;
pub use store::{PgStore, PriceStore};
pub use types::{EventCandidate, PriceKey, PriceRecord};
