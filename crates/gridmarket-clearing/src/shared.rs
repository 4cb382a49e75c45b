//! Shared market handle for concurrent callers.
//!
//! Clearing runs on one market must not interleave. `SharedMarket` puts
//! the market behind a single async mutex, so at most one run is in
//! flight and every caller sees the capacity left by the previous one.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use gridmarket_core::DemandBatch;
use gridmarket_placement::ClusterUsage;
use gridmarket_pricing::PriceList;

use crate::market::{Market, PeriodReport};

#[derive(Debug, Clone)]
pub struct SharedMarket {
    inner: Arc<Mutex<Market>>,
}

impl SharedMarket {
    pub fn new(market: Market) -> Self {
        Self {
            inner: Arc::new(Mutex::new(market)),
        }
    }

    /// Clear `batch` as the next period. Waits for any run in flight.
    pub async fn clear_period(&self, batch: DemandBatch) -> PeriodReport {
        let mut market = self.inner.lock().await;
        debug!(period = market.period() + 1, requests = batch.len(), "clearing run acquired market");
        market.clear_period(batch)
    }

    pub async fn quote(&self) -> PriceList {
        self.inner.lock().await.quote()
    }

    pub async fn snapshot(&self) -> Vec<ClusterUsage> {
        self.inner.lock().await.snapshot()
    }

    pub async fn period(&self) -> u64 {
        self.inner.lock().await.period()
    }

    /// Run `f` with exclusive access to the market.
    pub async fn with<R>(&self, f: impl FnOnce(&mut Market) -> R) -> R {
        let mut market = self.inner.lock().await;
        f(&mut market)
    }
}
