//! USD price oracle client
//!
//! Fetches one historical USD price point per (token, chainId, timestamp)
//! from the provider's `market_chart/range` endpoint, over a fixed 30-day
//! lookback window ending at the query instant. The provider returns sparse
//! price points; a narrow window risks an empty series, a wide window
//! wastes quota.
//!
//! Key features:
//! - Fixed chain allow-list mapped to provider chain slugs
//! - Tagged result (Priced vs UnsupportedChain) instead of a 0 sentinel
//! - "Most recent known price at or before the query instant" selection
//! - Rate-limit constants shared with the backfill pipeline
//!
//! Author: AI-Generated
//! Created: 2026-02-04

use crate::error::PriceError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Lookback window queried from the oracle, ending at the target timestamp.
pub const LOOKBACK_SECS: i64 = 30 * 24 * 60 * 60;

/// Provider rate limits: 30 calls/min, 10k/mo. The backfill pipeline sizes
/// its batches and inter-batch pause from these.
pub const CALLS_PER_MINUTE: usize = 30;
pub const COOLDOWN_SECS: u64 = 62;

/// Outbound request timeout. A hung oracle call would otherwise stall a
/// whole backfill batch indefinitely.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Chains we price, mapped to provider chain slugs. Testnets not supported.
pub const CHAIN_SLUGS: &[(i64, &str)] = &[
    (1, "ethereum"),
    (10, "optimistic-ethereum"),
    (8453, "base"),
    (42161, "arbitrum-one"),
];

/// Provider slug for a chain id, or None if outside the allow-list.
pub fn chain_slug(chain_id: i64) -> Option<&'static str> {
    CHAIN_SLUGS
        .iter()
        .find(|(id, _)| *id == chain_id)
        .map(|(_, slug)| *slug)
}

/// Outcome of one oracle call. An unsupported chain is not an error:
/// callers decide what "not priced" means at their boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriceQuote {
    Priced(f64),
    UnsupportedChain,
}

/// A source of USD prices. Implemented by `OracleClient`; test doubles
/// implement it to script per-row outcomes.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn usd_price(
        &self,
        token: &str,
        chain_id: i64,
        timestamp: i64,
    ) -> Result<PriceQuote, PriceError>;
}

/// `{"prices": [[timestampMs, priceUsd], ...]}`
#[derive(Debug, Deserialize)]
struct MarketChart {
    prices: Vec<(i64, f64)>,
}

pub struct OracleClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OracleClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("reqwest client"),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Point the client at a different endpoint (proxy, mock server).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl PriceSource for OracleClient {
    async fn usd_price(
        &self,
        token: &str,
        chain_id: i64,
        timestamp: i64,
    ) -> Result<PriceQuote, PriceError> {
        let Some(slug) = chain_slug(chain_id) else {
            debug!("Chain {} not in allow-list - not priced", chain_id);
            return Ok(PriceQuote::UnsupportedChain);
        };

        let from = (timestamp - LOOKBACK_SECS).to_string();
        let to = timestamp.to_string();
        let url = format!(
            "{}/coins/{}/contract/{}/market_chart/range",
            self.base_url, slug, token
        );

        let response = self
            .http
            .get(&url)
            .query(&[
                ("vs_currency", "usd"),
                ("from", from.as_str()),
                ("to", to.as_str()),
                ("precision", "full"),
            ])
            .header("x-cg-demo-api-key", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PriceError::UpstreamStatus(response.status()));
        }

        let chart: MarketChart = response.json().await?;
        let price = quote_from_points(&chart.prices, timestamp * 1000)?;
        Ok(PriceQuote::Priced(price))
    }
}

/// Select the most recent known price at or before `cutoff_ms`.
/// Ties on timestamp pick the later point in input order.
fn select_latest(points: &[(i64, f64)], cutoff_ms: i64) -> Option<(i64, f64)> {
    let mut best: Option<(i64, f64)> = None;
    for &(ts, price) in points {
        if ts > cutoff_ms {
            continue;
        }
        match best {
            Some((best_ts, _)) if ts < best_ts => {}
            _ => best = Some((ts, price)),
        }
    }
    best
}

/// Validate and select from a returned price series.
fn quote_from_points(points: &[(i64, f64)], cutoff_ms: i64) -> Result<f64, PriceError> {
    let Some((_, price)) = select_latest(points, cutoff_ms) else {
        return Err(PriceError::EmptyPriceFeed);
    };
    if !price.is_finite() {
        return Err(PriceError::InvalidPriceValue);
    }
    Ok(price)
}

#[cfg(test)]
pub mod testing {
    //! Scripted price source for resolver and pipeline tests.

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type QuoteFn =
        Box<dyn Fn(&str, i64, i64) -> Result<PriceQuote, PriceError> + Send + Sync>;

    pub struct ScriptedOracle {
        quote: QuoteFn,
        calls: AtomicUsize,
    }

    impl ScriptedOracle {
        pub fn new<F>(quote: F) -> Self
        where
            F: Fn(&str, i64, i64) -> Result<PriceQuote, PriceError> + Send + Sync + 'static,
        {
            Self {
                quote: Box::new(quote),
                calls: AtomicUsize::new(0),
            }
        }

        /// Always returns the same price.
        pub fn fixed(price: f64) -> Self {
            Self::new(move |_, _, _| Ok(PriceQuote::Priced(price)))
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PriceSource for ScriptedOracle {
        async fn usd_price(
            &self,
            token: &str,
            chain_id: i64,
            timestamp: i64,
        ) -> Result<PriceQuote, PriceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.quote)(token, chain_id, timestamp)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_chain_slug_allow_list() {
        assert_eq!(chain_slug(1), Some("ethereum"));
        assert_eq!(chain_slug(8453), Some("base"));
        assert_eq!(chain_slug(42161), Some("arbitrum-one"));
        assert_eq!(chain_slug(10), Some("optimistic-ethereum"));
        // Testnets and unknown chains
        assert_eq!(chain_slug(11155111), None);
        assert_eq!(chain_slug(137), None);
    }

    #[test]
    fn test_selects_latest_at_or_before_cutoff() {
        let points = [(100, 1.0), (150, 2.0), (200, 3.0)];
        let (ts, price) = select_latest(&points, 180).unwrap();
        assert_eq!(ts, 150);
        assert_approx_eq!(price, 2.0);
    }

    #[test]
    fn test_selection_handles_out_of_order_points() {
        let points = [(200, 3.0), (100, 1.0), (150, 2.0)];
        let (ts, _) = select_latest(&points, 999).unwrap();
        assert_eq!(ts, 200);
    }

    #[test]
    fn test_equal_timestamps_pick_last_in_input_order() {
        let points = [(150, 2.0), (150, 7.0)];
        let (_, price) = select_latest(&points, 200).unwrap();
        assert_approx_eq!(price, 7.0);
    }

    #[test]
    fn test_empty_series_is_an_error() {
        assert!(matches!(
            quote_from_points(&[], 1000),
            Err(PriceError::EmptyPriceFeed)
        ));
        // All points after the cutoff behave like an empty series
        assert!(matches!(
            quote_from_points(&[(500, 1.0)], 100),
            Err(PriceError::EmptyPriceFeed)
        ));
    }

    #[test]
    fn test_non_finite_price_is_an_error() {
        assert!(matches!(
            quote_from_points(&[(100, f64::NAN)], 1000),
            Err(PriceError::InvalidPriceValue)
        ));
        assert!(matches!(
            quote_from_points(&[(100, f64::INFINITY)], 1000),
            Err(PriceError::InvalidPriceValue)
        ));
    }

    #[tokio::test]
    async fn test_unsupported_chain_skips_the_network() {
        // Unroutable base_url: if the allow-list check did not short-circuit,
        // this would error instead of returning UnsupportedChain.
        let oracle = OracleClient::new("test-key").with_base_url("http://127.0.0.1:1");
        let quote = oracle
            .usd_price("0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2", 137, 1_700_000_000)
            .await
            .unwrap();
        assert_eq!(quote, PriceQuote::UnsupportedChain);
    }

    #[test]
    fn test_lookback_window_is_thirty_days() {
        assert_eq!(LOOKBACK_SECS, 2_592_000);
    }
}
