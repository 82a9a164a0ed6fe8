//! Inter-batch pacing
//!
//! The oracle enforces a per-minute quota; the pipeline stays under it by
//! pausing between batches. The pause lives behind a trait so tests can
//! count waits instead of sleeping through them.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self);
}

/// Fixed-interval pacer matching the oracle quota window.
pub struct FixedInterval {
    delay: Duration,
}

impl FixedInterval {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Interval derived from the oracle's published rate limit.
    pub fn oracle_default() -> Self {
        Self::new(Duration::from_secs(crate::oracle::COOLDOWN_SECS))
    }
}

#[async_trait]
impl Pacer for FixedInterval {
    async fn pause(&self) {
        info!("Waiting {} seconds...", self.delay.as_secs());
        sleep(self.delay).await;
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts pauses without sleeping.
    #[derive(Default)]
    pub struct RecordingPacer {
        pauses: AtomicUsize,
    }

    impl RecordingPacer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn pause_count(&self) -> usize {
            self.pauses.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Pacer for RecordingPacer {
        async fn pause(&self) {
            self.pauses.fetch_add(1, Ordering::SeqCst);
        }
    }
}
