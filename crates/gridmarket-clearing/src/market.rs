//! Market — the owned state that persists between clearing runs.
//!
//! Holds the validated config, the capacity store and the period counter.
//! Callers own its lifetime; independent markets share nothing.

use std::path::Path;

use serde::Serialize;
use tracing::info;

use gridmarket_core::{DemandBatch, DemandQueue, MarketConfig};
use gridmarket_placement::{CapacityStore, ClusterUsage};
use gridmarket_pricing::{PriceList, guaranteed_price, spot_price};

use crate::engine::{ClusterSummary, clear};
use crate::error::{MarketError, MarketResult};
use crate::plan::AllocationPlan;

/// Result of one cleared period, ready for rendering.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PeriodReport {
    /// 1-based number of the period this report closes.
    pub period: u64,
    pub price_list: PriceList,
    pub allocation_plan: AllocationPlan,
    pub clusters: Vec<ClusterSummary>,
    /// Remaining capacity after the period, carried into the next one.
    pub capacity: Vec<ClusterUsage>,
}

#[derive(Debug, Clone)]
pub struct Market {
    config: MarketConfig,
    store: CapacityStore,
    period: u64,
}

impl Market {
    /// Create a market with every spot machine idle.
    pub fn new(config: MarketConfig) -> MarketResult<Self> {
        config.validate()?;
        let store = CapacityStore::from_config(&config);
        info!(
            clusters = config.clusters.len(),
            gpus_per_machine = config.gpus_per_machine(),
            "market opened"
        );
        Ok(Self {
            config,
            store,
            period: 0,
        })
    }

    pub fn from_file(path: &Path) -> MarketResult<Self> {
        Self::new(MarketConfig::from_file(path)?)
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    pub fn capacity(&self) -> &CapacityStore {
        &self.store
    }

    /// Number of periods closed so far.
    pub fn period(&self) -> u64 {
        self.period
    }

    /// Current capacity per cluster.
    pub fn snapshot(&self) -> Vec<ClusterUsage> {
        self.store.snapshot()
    }

    /// Prices implied by current utilization, without clearing anything.
    pub fn quote(&self) -> PriceList {
        let gpm = self.config.gpus_per_machine();
        let mut prices = PriceList::new();
        for cluster in &self.config.clusters {
            let used = self.store.cluster(&cluster.id).map(|c| c.used_gpus()).unwrap_or(0);
            prices.push(cluster.id.clone(), guaranteed_price(cluster), spot_price(cluster, gpm, used));
        }
        prices
    }

    /// Clear `batch` as the next period and close it.
    pub fn clear_period(&mut self, batch: DemandBatch) -> PeriodReport {
        let requests = batch.len();
        let requested_gpus = batch.requested_gpus();
        let outcome = clear(&self.config, &mut self.store, batch);
        let period = self.advance_period();

        info!(
            period,
            requests,
            requested_gpus,
            satisfied = outcome.plan.satisfied_instances(),
            unsatisfied = outcome.plan.unsatisfied_instances(),
            "period cleared"
        );

        PeriodReport {
            period,
            price_list: outcome.prices,
            allocation_plan: outcome.plan,
            clusters: outcome.clusters,
            capacity: self.store.snapshot(),
        }
    }

    /// Drain `queue` and clear it. Drained requests are never replayed.
    pub fn clear_queue(&mut self, queue: &mut DemandQueue) -> PeriodReport {
        self.clear_period(queue.take())
    }

    /// Close the current period and return its number.
    pub fn advance_period(&mut self) -> u64 {
        self.period += 1;
        self.period
    }

    /// Return every machine of `cluster` to full capacity.
    pub fn release_cluster(&mut self, cluster: &str) -> MarketResult<()> {
        if !self.store.release_cluster(cluster) {
            return Err(MarketError::UnknownCluster(cluster.to_string()));
        }
        info!(%cluster, "capacity released");
        Ok(())
    }

    /// Return every machine in the market to full capacity.
    pub fn release_all(&mut self) {
        self.store.release_all();
        info!("all capacity released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridmarket_core::{ClusterConfig, ConfigError, WorkloadShape};

    fn config() -> MarketConfig {
        MarketConfig::new(vec![ClusterConfig {
            id: "a".to_string(),
            total_machines: 3,
            guaranteed_machines: 1,
            base_guaranteed: 1.0,
            base_spot: 0.2,
            sensitivity_g: 2.0,
            sensitivity_s: 1.2,
        }])
    }

    #[test]
    fn rejects_invalid_config() {
        let mut bad = config();
        bad.clusters[0].guaranteed_machines = 4;
        let err = Market::new(bad).unwrap_err();
        assert!(matches!(
            err,
            MarketError::Config(ConfigError::GuaranteedExceedsTotal { .. })
        ));
    }

    #[test]
    fn periods_are_counted() {
        let mut market = Market::new(config()).unwrap();
        assert_eq!(market.period(), 0);
        assert_eq!(market.clear_period(DemandBatch::default()).period, 1);
        assert_eq!(market.clear_period(DemandBatch::default()).period, 2);
        assert_eq!(market.advance_period(), 3);
    }

    #[test]
    fn clear_queue_drains_requests() {
        let mut market = Market::new(config()).unwrap();
        let mut queue = DemandQueue::new();
        queue.submit_floating(WorkloadShape::new("inference", 1), 2).unwrap();

        let first = market.clear_queue(&mut queue);
        assert_eq!(first.allocation_plan.satisfied_instances(), 2);
        assert!(queue.is_empty());

        let second = market.clear_queue(&mut queue);
        assert!(second.allocation_plan.satisfied_demand.is_empty());
        assert_eq!(market.capacity().cluster("a").unwrap().used_gpus(), 2);
    }

    #[test]
    fn quote_tracks_utilization() {
        let mut market = Market::new(config()).unwrap();
        let idle = market.quote();
        assert_eq!(idle, PriceList::idle(market.config()));

        let mut queue = DemandQueue::new();
        queue.submit_pinned("a", WorkloadShape::new("large_training", 8), 2).unwrap();
        market.clear_queue(&mut queue);

        let busy = market.quote();
        assert!((busy.spot("a").unwrap() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn release_cluster_unknown_is_error() {
        let mut market = Market::new(config()).unwrap();
        assert!(matches!(
            market.release_cluster("zz"),
            Err(MarketError::UnknownCluster(id)) if id == "zz"
        ));
    }

    #[test]
    fn release_frees_capacity() {
        let mut market = Market::new(config()).unwrap();
        let mut queue = DemandQueue::new();
        queue.submit_pinned("a", WorkloadShape::new("large_training", 8), 2).unwrap();
        market.clear_queue(&mut queue);
        assert_eq!(market.snapshot()[0].free_gpus, 0);

        market.release_cluster("a").unwrap();
        assert_eq!(market.snapshot()[0].free_gpus, 16);

        queue.submit_pinned("a", WorkloadShape::new("large_training", 8), 1).unwrap();
        market.clear_queue(&mut queue);
        market.release_all();
        assert_eq!(market.snapshot()[0].used_gpus, 0);
    }
}
