//! Backfill pipeline
//!
//! One-shot batch job that keeps the price table ahead of read traffic:
//!   1. Discovery - drain the activity event feed into candidate triples
//!   2. Seeding   - conflict-safe insert of a placeholder row per candidate
//!   3. Selection - every row still missing a price, including leftovers
//!                  from prior failed runs
//!   4. Resolution - fixed-size batches processed strictly sequentially,
//!                  bounded concurrent fan-out inside each batch, a pause
//!                  between consecutive batches to respect the oracle quota
//!   5. Reporting - read back table totals and deliver a webhook summary
//!
//! A single row's failure increments an error counter and never aborts the
//! batch or the run. Re-running is safe: seeding is a no-op for existing
//! triples and only still-null rows are re-attempted.
//!
//! Author: AI-Generated
//! Created: 2026-02-04

use crate::error::PriceError;
use crate::events::EventFeed;
use crate::notify::Notifier;
use crate::oracle::{PriceQuote, PriceSource};
use crate::rate_limit::Pacer;
use crate::store::PriceStore;
use crate::types::{PriceKey, PriceRecord};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{info, warn};

/// Batch geometry. Defaults are sized to the oracle's per-minute quota.
#[derive(Debug, Clone)]
pub struct BackfillSettings {
    /// Rows per batch; one batch fits inside one quota window.
    pub batch_size: usize,
    /// Concurrent in-flight fetches within a batch.
    pub fetch_concurrency: usize,
}

impl Default for BackfillSettings {
    fn default() -> Self {
        Self {
            batch_size: crate::oracle::CALLS_PER_MINUTE,
            fetch_concurrency: 10,
        }
    }
}

/// End-of-run accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackfillReport {
    /// Rows in the table after the run.
    pub total_records: u64,
    /// Rows still missing a price after the run.
    pub missing_prices: u64,
    /// Work list size at selection time.
    pub attempted: usize,
    pub succeeded: usize,
    pub errors: usize,
    /// Stage-2 inserts that failed (best-effort, counted not fatal).
    pub seed_failures: usize,
    pub batches: usize,
}

pub struct BackfillPipeline {
    store: Arc<dyn PriceStore>,
    oracle: Arc<dyn PriceSource>,
    feed: Arc<dyn EventFeed>,
    pacer: Arc<dyn Pacer>,
    notifier: Notifier,
    settings: BackfillSettings,
}

impl BackfillPipeline {
    pub fn new(
        store: Arc<dyn PriceStore>,
        oracle: Arc<dyn PriceSource>,
        feed: Arc<dyn EventFeed>,
        pacer: Arc<dyn Pacer>,
        notifier: Notifier,
        settings: BackfillSettings,
    ) -> Self {
        Self {
            store,
            oracle,
            feed,
            pacer,
            notifier,
            settings,
        }
    }

    /// Run all five stages to completion.
    pub async fn run(&self) -> Result<BackfillReport, PriceError> {
        // Stage 1 - discovery
        let candidates = self.feed.fetch_all().await?;
        info!("Found {} events", candidates.len());

        // Stage 2 - seeding. Each insert's outcome is independent; failures
        // are counted and surfaced in the report rather than aborting.
        let seed_results: Vec<Result<(), PriceError>> = stream::iter(candidates.iter())
            .map(|candidate| {
                let record = PriceRecord::placeholder(&candidate.key());
                async move { self.store.insert_ignore(&record).await }
            })
            .buffer_unordered(self.settings.fetch_concurrency)
            .collect()
            .await;
        let seed_failures = seed_results
            .iter()
            .filter(|r| {
                if let Err(e) = r {
                    warn!("Seed insert failed: {}", e);
                }
                r.is_err()
            })
            .count();

        // Stage 3 - selection, independent of what was just seeded so rows
        // left null by prior failed runs are picked up too
        let work = self.store.find_unpriced().await?;
        let batches: Vec<&[PriceKey]> = work.chunks(self.settings.batch_size.max(1)).collect();

        info!(
            "Fetching USD prices for {} rows in {} batches",
            work.len(),
            batches.len()
        );

        // Stage 4 - batched resolution, one batch at a time
        let mut errors = 0usize;
        for (i, batch) in batches.iter().enumerate() {
            let results: Vec<Result<(), PriceError>> = stream::iter(batch.iter())
                .map(|key| self.resolve_row(key))
                .buffer_unordered(self.settings.fetch_concurrency)
                .collect()
                .await;
            errors += results.iter().filter(|r| r.is_err()).count();

            info!("Batch {}/{} finished", i + 1, batches.len());

            // Pause between consecutive batches, but not after the last
            if i + 1 < batches.len() {
                self.pacer.pause().await;
            }
        }

        info!(
            "Tried updating USD prices for {} records. {} succeeded, {} errors.",
            work.len(),
            work.len() - errors,
            errors
        );

        // Stage 5 - reporting
        let totals = self.store.totals().await?;
        let report = BackfillReport {
            total_records: totals.total,
            missing_prices: totals.unpriced,
            attempted: work.len(),
            succeeded: work.len() - errors,
            errors,
            seed_failures,
            batches: batches.len(),
        };

        self.notifier.send_report(&report).await;

        Ok(report)
    }

    /// Fetch and store the price for one row. The update is matched on the
    /// full primary key, so a row mutated concurrently is not misaddressed.
    async fn resolve_row(&self, key: &PriceKey) -> Result<(), PriceError> {
        let result = async {
            let price_usd = match self
                .oracle
                .usd_price(&key.token, key.chain_id, key.timestamp)
                .await?
            {
                PriceQuote::Priced(price) => price,
                PriceQuote::UnsupportedChain => 0.0,
            };
            self.store.set_price(key, price_usd).await
        }
        .await;

        if let Err(ref e) = result {
            warn!(
                "Error updating price for token: {}, timestamp: {}, chainId: {}: {}",
                key.token, key.timestamp, key.chain_id, e
            );
        }
        result
    }
}
