//! Error taxonomy for the price index
//!
//! Read-path errors map to HTTP statuses in the API server: `InvalidRequest`
//! is a 400, everything else is a 500 with the error text as the body.
//! The backfill pipeline isolates these per row instead of propagating.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PriceError {
    /// Malformed query input. Never retried; no storage or oracle
    /// traffic happens once this is raised.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The oracle returned no price points for the lookback window.
    #[error("Empty price feed")]
    EmptyPriceFeed,

    /// The selected price point is not a finite number.
    #[error("Bad price value")]
    InvalidPriceValue,

    /// Outbound HTTP failure (oracle, event feed).
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status from an upstream service.
    #[error("upstream returned status {0}")]
    UpstreamStatus(reqwest::StatusCode),

    /// Persistence layer failure.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl PriceError {
    /// True for errors caused by the caller's input rather than by
    /// storage or upstream services.
    pub fn is_client_error(&self) -> bool {
        matches!(self, PriceError::InvalidRequest(_))
    }
}
