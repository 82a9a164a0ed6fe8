//! Durable price storage
//!
//! Single Postgres table keyed by (token, chain_id, timestamp) with a
//! nullable USD price. All writes go through two conflict-safe shapes:
//! - insert with ON CONFLICT DO NOTHING (first writer wins, never overwrites)
//! - update matched on the full composite key (tolerates concurrent mutation)
//!
//! The trait abstraction allows for easier testing and keeps the pipeline
//! and resolver independent of the driver.
//!
//! Author: AI-Generated
//! Created: 2026-02-04

use crate::error::PriceError;
use crate::types::{validate_token_format, PriceKey, PriceRecord};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Row counts used by the backfill report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableTotals {
    pub total: u64,
    pub unpriced: u64,
}

/// Database operations for price rows.
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Exact-key lookup.
    async fn find(&self, key: &PriceKey) -> Result<Option<PriceRecord>, PriceError>;

    /// Conflict-safe insert: a no-op if the key already exists. The stored
    /// price is never overwritten by this path.
    async fn insert_ignore(&self, record: &PriceRecord) -> Result<(), PriceError>;

    /// Set the price of an existing row, matched on the full primary key.
    async fn set_price(&self, key: &PriceKey, price_usd: f64) -> Result<(), PriceError>;

    /// All keys whose price is still unresolved, oldest first.
    async fn find_unpriced(&self) -> Result<Vec<PriceKey>, PriceError>;

    /// Table totals for reporting.
    async fn totals(&self) -> Result<TableTotals, PriceError>;
}

/// Postgres-backed store.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, PriceError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Create the price table if it does not exist yet.
    pub async fn migrate(&self) -> Result<(), PriceError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS price (
                token      VARCHAR(42)      NOT NULL,
                timestamp  BIGINT           NOT NULL,
                chain_id   BIGINT           NOT NULL,
                price_usd  DOUBLE PRECISION,
                PRIMARY KEY (token, chain_id, timestamp),
                CONSTRAINT address_check_format CHECK (token LIKE '0x%')
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_price_unpriced ON price(timestamp) WHERE price_usd IS NULL",
        )
        .execute(&self.pool)
        .await?;

        info!("Price table ready");
        Ok(())
    }
}

#[async_trait]
impl PriceStore for PgStore {
    async fn find(&self, key: &PriceKey) -> Result<Option<PriceRecord>, PriceError> {
        let row = sqlx::query_as::<_, PriceRecord>(
            "SELECT token, chain_id, timestamp, price_usd FROM price \
             WHERE token = $1 AND chain_id = $2 AND timestamp = $3",
        )
        .bind(&key.token)
        .bind(key.chain_id)
        .bind(key.timestamp)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn insert_ignore(&self, record: &PriceRecord) -> Result<(), PriceError> {
        validate_token_format(&record.token)?;

        sqlx::query(
            "INSERT INTO price (token, chain_id, timestamp, price_usd) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (token, chain_id, timestamp) DO NOTHING",
        )
        .bind(&record.token)
        .bind(record.chain_id)
        .bind(record.timestamp)
        .bind(record.price_usd)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_price(&self, key: &PriceKey, price_usd: f64) -> Result<(), PriceError> {
        sqlx::query(
            "UPDATE price SET price_usd = $4 \
             WHERE token = $1 AND chain_id = $2 AND timestamp = $3",
        )
        .bind(&key.token)
        .bind(key.chain_id)
        .bind(key.timestamp)
        .bind(price_usd)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_unpriced(&self) -> Result<Vec<PriceKey>, PriceError> {
        let rows = sqlx::query_as::<_, PriceRecord>(
            "SELECT token, chain_id, timestamp, price_usd FROM price \
             WHERE price_usd IS NULL ORDER BY timestamp ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(PriceRecord::key).collect())
    }

    async fn totals(&self) -> Result<TableTotals, PriceError> {
        let (total, unpriced): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE price_usd IS NULL) FROM price",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(TableTotals {
            total: total as u64,
            unpriced: unpriced as u64,
        })
    }
}

#[cfg(test)]
pub mod testing {
    //! In-memory store with the same conflict semantics as the Postgres
    //! implementation, for exercising the resolver and pipeline without
    //! a database.

    use super::*;
    use std::collections::{BTreeMap, HashSet};
    use std::sync::Mutex;

    type Key = (String, i64, i64);

    #[derive(Default)]
    pub struct MemoryStore {
        rows: Mutex<BTreeMap<Key, Option<f64>>>,
        /// Tokens whose inserts should fail, to exercise seed-failure paths.
        pub fail_insert_tokens: Mutex<HashSet<String>>,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn row_count(&self) -> usize {
            self.rows.lock().unwrap().len()
        }

        pub fn price_of(&self, key: &PriceKey) -> Option<Option<f64>> {
            self.rows
                .lock()
                .unwrap()
                .get(&(key.token.clone(), key.chain_id, key.timestamp))
                .copied()
        }

        pub fn seed_null(&self, key: &PriceKey) {
            self.rows
                .lock()
                .unwrap()
                .insert((key.token.clone(), key.chain_id, key.timestamp), None);
        }
    }

    #[async_trait]
    impl PriceStore for MemoryStore {
        async fn find(&self, key: &PriceKey) -> Result<Option<PriceRecord>, PriceError> {
            let rows = self.rows.lock().unwrap();
            Ok(rows
                .get(&(key.token.clone(), key.chain_id, key.timestamp))
                .map(|price| PriceRecord {
                    token: key.token.clone(),
                    chain_id: key.chain_id,
                    timestamp: key.timestamp,
                    price_usd: *price,
                }))
        }

        async fn insert_ignore(&self, record: &PriceRecord) -> Result<(), PriceError> {
            validate_token_format(&record.token)?;
            if self
                .fail_insert_tokens
                .lock()
                .unwrap()
                .contains(&record.token)
            {
                return Err(PriceError::InvalidRequest(format!(
                    "simulated insert failure for {}",
                    record.token
                )));
            }

            let mut rows = self.rows.lock().unwrap();
            // First writer wins
            rows.entry((record.token.clone(), record.chain_id, record.timestamp))
                .or_insert(record.price_usd);
            Ok(())
        }

        async fn set_price(&self, key: &PriceKey, price_usd: f64) -> Result<(), PriceError> {
            let mut rows = self.rows.lock().unwrap();
            if let Some(price) = rows.get_mut(&(key.token.clone(), key.chain_id, key.timestamp)) {
                *price = Some(price_usd);
            }
            Ok(())
        }

        async fn find_unpriced(&self) -> Result<Vec<PriceKey>, PriceError> {
            let rows = self.rows.lock().unwrap();
            Ok(rows
                .iter()
                .filter(|(_, price)| price.is_none())
                .map(|((token, chain_id, timestamp), _)| PriceKey {
                    token: token.clone(),
                    chain_id: *chain_id,
                    timestamp: *timestamp,
                })
                .collect())
        }

        async fn totals(&self) -> Result<TableTotals, PriceError> {
            let rows = self.rows.lock().unwrap();
            Ok(TableTotals {
                total: rows.len() as u64,
                unpriced: rows.values().filter(|p| p.is_none()).count() as u64,
            })
        }
    }
}
