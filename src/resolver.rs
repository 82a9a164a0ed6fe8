//! On-demand price resolution (the read path)
//!
//! Cache-or-fetch: return the stored price for an exact (token, chainId,
//! timestamp) triple, or fetch one from the oracle and write it back with a
//! conflict-safe insert. Concurrent resolvers for the same triple may each
//! hit the oracle (accepted wasted work); only the first write survives,
//! but each caller still gets the price it fetched for its own response.
//! No retries here: retry policy belongs to callers.

use crate::error::PriceError;
use crate::oracle::{PriceQuote, PriceSource};
use crate::store::PriceStore;
use crate::types::{PriceKey, PriceRecord};
use std::sync::Arc;
use tracing::debug;

pub struct CacheResolver {
    store: Arc<dyn PriceStore>,
    oracle: Arc<dyn PriceSource>,
}

impl CacheResolver {
    pub fn new(store: Arc<dyn PriceStore>, oracle: Arc<dyn PriceSource>) -> Self {
        Self { store, oracle }
    }

    /// Resolve the USD price for raw query input. `chain_id` and
    /// `timestamp` must parse as integers and `token` must be non-empty;
    /// anything else is an `InvalidRequest` before any storage or oracle
    /// traffic happens.
    pub async fn resolve(
        &self,
        token: &str,
        chain_id: &str,
        timestamp: &str,
    ) -> Result<f64, PriceError> {
        if token.is_empty() {
            return Err(PriceError::InvalidRequest("missing token".into()));
        }
        let chain_id: i64 = chain_id
            .parse()
            .map_err(|_| PriceError::InvalidRequest("chainId must be an integer".into()))?;
        let timestamp: i64 = timestamp
            .parse()
            .map_err(|_| PriceError::InvalidRequest("timestamp must be an integer".into()))?;

        let key = PriceKey::new(token, chain_id, timestamp);

        // Check for a stored price matching the query
        if let Some(row) = self.store.find(&key).await? {
            if let Some(price_usd) = row.price_usd {
                debug!("Cache hit for {}", key);
                return Ok(price_usd);
            }
        }

        // No stored price: fetch and insert. A chain outside the
        // allow-list resolves to 0 rather than an error.
        let price_usd = match self.oracle.usd_price(&key.token, chain_id, timestamp).await? {
            PriceQuote::Priced(price) => price,
            PriceQuote::UnsupportedChain => 0.0,
        };

        // Conflict-safe: if a concurrent resolver landed first, its value
        // stays and this insert is silently dropped.
        self.store
            .insert_ignore(&PriceRecord::priced(&key, price_usd))
            .await?;

        Ok(price_usd)
    }
}
