//! Clearing engine — one period of the market.
//!
//! A run moves through fixed phases:
//!
//! ```text
//! ComputeGuaranteedPrices → AllocatePinned → AllocateFloating → FinalizeSpotPrices → Done
//! ```
//!
//! - **Guaranteed prices** come from the persistent reservation ratio.
//! - **Pinned** requests are placed only on their named cluster, one job
//!   at a time via first-fit. Any shortfall is recorded, never redirected.
//! - **Floating** requests are expanded into unit jobs and processed in
//!   queue order, request by request. Each unit goes to the feasible
//!   cluster with the strictly lowest marginal spot price
//!   (`spot_price(allocated + shape.gpus)`); ties keep the cluster listed
//!   first.
//! - **Spot prices** are quoted from each cluster's final allocation.
//!
//! The per-cluster allocation counter starts at the GPUs already in use
//! when the period opens, so capacity carried over from earlier periods
//! keeps pushing spot prices up.
//!
//! Clearing cannot fail: every shortfall is data in the plan.

use serde::Serialize;
use tracing::{debug, warn};

use gridmarket_core::{
    ClusterConfig, ClusterId, DemandBatch, FloatingRequest, MarketConfig, PinnedRequest,
    WorkloadShape,
};
use gridmarket_placement::{CapacityStore, can_fit, try_place};
use gridmarket_pricing::{PriceList, guaranteed_price, is_market_closed, spot_price};

use crate::plan::{
    AllocationPlan, SatisfiedFloating, SatisfiedPinned, UnsatisfiedFloating, UnsatisfiedPinned,
    UnsatisfiedReason,
};

/// Per-cluster GPU accounting for one period.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ClusterSummary {
    pub cluster: ClusterId,
    /// Spot supply in GPUs (guaranteed machines excluded).
    pub spot_supply_gpus: u64,
    /// GPUs already in use when the period opened.
    pub carried_over_gpus: u64,
    /// GPUs placed this period for pinned demand.
    pub pinned_gpus: u64,
    /// GPUs placed this period for floating demand.
    pub floating_gpus: u64,
    /// GPUs in use when the period closed.
    pub used_gpus: u64,
    pub free_gpus: u64,
}

impl ClusterSummary {
    /// GPUs placed this period, both classes.
    pub fn allocated_gpus(&self) -> u64 {
        self.pinned_gpus + self.floating_gpus
    }
}

/// Everything one clearing run produces.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ClearingOutcome {
    pub prices: PriceList,
    pub plan: AllocationPlan,
    pub clusters: Vec<ClusterSummary>,
}

struct Ledger {
    carried_over: u64,
    /// Running allocation used for pricing: carried over + placed so far.
    allocated: u64,
    pinned: u64,
    floating: u64,
}

struct ClearingRun<'a> {
    config: &'a MarketConfig,
    store: &'a mut CapacityStore,
    /// Parallel to `config.clusters`.
    ledgers: Vec<Ledger>,
    guaranteed: Vec<f64>,
    plan: AllocationPlan,
}

/// Clear one period of `batch` against `store`.
///
/// `store` is mutated in place and carries the remaining capacity into
/// the next period. The batch is consumed.
pub fn clear(config: &MarketConfig, store: &mut CapacityStore, batch: DemandBatch) -> ClearingOutcome {
    let mut run = ClearingRun::open(config, store);
    run.compute_guaranteed_prices();
    for request in &batch.pinned {
        run.allocate_pinned(request);
    }
    for request in &batch.floating {
        run.allocate_floating(request);
    }
    run.finalize()
}

impl<'a> ClearingRun<'a> {
    fn open(config: &'a MarketConfig, store: &'a mut CapacityStore) -> Self {
        let ledgers = config
            .clusters
            .iter()
            .map(|c| {
                let carried_over = store.cluster(&c.id).map(|cap| cap.used_gpus()).unwrap_or(0);
                Ledger {
                    carried_over,
                    allocated: carried_over,
                    pinned: 0,
                    floating: 0,
                }
            })
            .collect();
        Self {
            config,
            store,
            ledgers,
            guaranteed: Vec::new(),
            plan: AllocationPlan::default(),
        }
    }

    fn compute_guaranteed_prices(&mut self) {
        self.guaranteed = self.config.clusters.iter().map(guaranteed_price).collect();
    }

    fn cluster_index(&self, id: &str) -> Option<usize> {
        self.config.clusters.iter().position(|c| c.id == id)
    }

    fn allocate_pinned(&mut self, request: &PinnedRequest) {
        let Some(index) = self.cluster_index(&request.cluster) else {
            warn!(
                request = request.id,
                cluster = %request.cluster,
                "pinned request targets unknown cluster"
            );
            self.push_unsatisfied_pinned(request, request.quantity, UnsatisfiedReason::UnknownCluster);
            return;
        };

        // Capacity only shrinks within a run, so the first miss ends the request.
        let mut placed = 0;
        while placed < request.quantity
            && try_place(self.store, &request.cluster, &request.shape).is_some()
        {
            placed += 1;
        }

        let gpus = u64::from(placed) * u64::from(request.shape.gpus);
        let ledger = &mut self.ledgers[index];
        ledger.allocated += gpus;
        ledger.pinned += gpus;

        if placed > 0 {
            self.plan.satisfied_demand.pinned.push(SatisfiedPinned {
                id: request.id,
                cluster: request.cluster.clone(),
                shape: request.shape.name.clone(),
                requested_quantity: request.quantity,
                satisfied_quantity: placed,
            });
        }

        let deficit = request.quantity - placed;
        if deficit > 0 {
            let reason = if is_market_closed(&self.config.clusters[index]) {
                UnsatisfiedReason::MarketClosed
            } else {
                UnsatisfiedReason::CapacityExhausted
            };
            warn!(
                request = request.id,
                cluster = %request.cluster,
                placed,
                deficit,
                ?reason,
                "pinned request not fully satisfied"
            );
            self.push_unsatisfied_pinned(request, deficit, reason);
        }
    }

    fn push_unsatisfied_pinned(&mut self, request: &PinnedRequest, deficit: u32, reason: UnsatisfiedReason) {
        self.plan.unsatisfied_demand.pinned.push(UnsatisfiedPinned {
            id: request.id,
            cluster: request.cluster.clone(),
            shape: request.shape.name.clone(),
            requested_quantity: request.quantity,
            unsatisfied_quantity: deficit,
            reason,
        });
    }

    /// Feasible cluster with the lowest marginal spot price for one job.
    fn cheapest_cluster(&self, shape: &WorkloadShape) -> Option<(usize, f64)> {
        let gpm = self.config.gpus_per_machine();
        let mut best: Option<(usize, f64)> = None;
        for (index, cluster) in self.config.clusters.iter().enumerate() {
            if !can_fit(&*self.store, &cluster.id, shape) {
                continue;
            }
            let marginal = spot_price(cluster, gpm, self.ledgers[index].allocated + u64::from(shape.gpus));
            // Strict comparison: on a tie the earlier cluster stays.
            if best.is_none_or(|(_, price)| marginal < price) {
                best = Some((index, marginal));
            }
        }
        best
    }

    fn allocate_floating(&mut self, request: &FloatingRequest) {
        let mut satisfied = SatisfiedFloating::new(request.id, &request.shape.name, request.quantity);
        let mut unplaced = 0u32;

        // Capacity only shrinks within a run, so once no cluster fits a
        // unit, none fits the rest of the request either.
        for attempt in 0..request.quantity {
            let Some((index, marginal)) = self.cheapest_cluster(&request.shape) else {
                unplaced = request.quantity - attempt;
                break;
            };
            let cluster = &self.config.clusters[index];
            let Some(machine) = try_place(self.store, &cluster.id, &request.shape) else {
                unplaced = request.quantity - attempt;
                break;
            };

            let gpus = u64::from(request.shape.gpus);
            let ledger = &mut self.ledgers[index];
            ledger.allocated += gpus;
            ledger.floating += gpus;
            satisfied.record(&cluster.id);

            debug!(
                request = request.id,
                cluster = %cluster.id,
                machine,
                marginal_price = marginal,
                allocated_gpus = ledger.allocated,
                "floating unit placed"
            );
        }

        if satisfied.satisfied_quantity > 0 {
            self.plan.satisfied_demand.floating.push(satisfied);
        }

        if unplaced > 0 {
            let reason = if self.config.clusters.iter().all(is_market_closed) {
                UnsatisfiedReason::MarketClosed
            } else {
                UnsatisfiedReason::CapacityExhausted
            };
            warn!(
                request = request.id,
                shape = %request.shape.name,
                unplaced,
                ?reason,
                "floating request not fully satisfied"
            );
            self.plan.unsatisfied_demand.floating.push(UnsatisfiedFloating {
                id: request.id,
                shape: request.shape.name.clone(),
                requested_quantity: request.quantity,
                unsatisfied_quantity: unplaced,
                reason,
            });
        }
    }

    fn finalize(self) -> ClearingOutcome {
        let gpm = self.config.gpus_per_machine();
        let mut prices = PriceList::new();
        let mut clusters = Vec::with_capacity(self.config.clusters.len());

        for ((cluster, ledger), guaranteed) in self
            .config
            .clusters
            .iter()
            .zip(&self.ledgers)
            .zip(&self.guaranteed)
        {
            prices.push(cluster.id.clone(), *guaranteed, spot_price(cluster, gpm, ledger.allocated));
            clusters.push(summarize(cluster, ledger, self.store, gpm));
        }

        ClearingOutcome {
            prices,
            plan: self.plan,
            clusters,
        }
    }
}

fn summarize(cluster: &ClusterConfig, ledger: &Ledger, store: &CapacityStore, gpm: u32) -> ClusterSummary {
    let (used_gpus, free_gpus) = store
        .cluster(&cluster.id)
        .map(|c| (c.used_gpus(), c.free_gpus()))
        .unwrap_or((0, 0));
    ClusterSummary {
        cluster: cluster.id.clone(),
        spot_supply_gpus: cluster.spot_supply_gpus(gpm),
        carried_over_gpus: ledger.carried_over,
        pinned_gpus: ledger.pinned,
        floating_gpus: ledger.floating,
        used_gpus,
        free_gpus,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridmarket_core::DemandQueue;

    fn cluster(id: &str, total: u32, guaranteed: u32, base_spot: f64) -> ClusterConfig {
        ClusterConfig {
            id: id.to_string(),
            total_machines: total,
            guaranteed_machines: guaranteed,
            base_guaranteed: 1.0,
            base_spot,
            sensitivity_g: 2.0,
            sensitivity_s: 1.2,
        }
    }

    fn shape(name: &str, gpus: u32) -> WorkloadShape {
        WorkloadShape::new(name, gpus)
    }

    #[test]
    fn empty_batch_quotes_idle_prices() {
        let config = MarketConfig::new(vec![cluster("a", 2, 0, 0.2)]);
        let mut store = CapacityStore::from_config(&config);
        let outcome = clear(&config, &mut store, DemandBatch::default());

        assert!(outcome.plan.satisfied_demand.is_empty());
        assert!(outcome.plan.unsatisfied_demand.is_empty());
        assert_eq!(outcome.prices, PriceList::idle(&config));
        assert_eq!(outcome.clusters[0].allocated_gpus(), 0);
    }

    #[test]
    fn pinned_unknown_cluster_is_unsatisfied() {
        let config = MarketConfig::new(vec![cluster("a", 2, 0, 0.2)]);
        let mut store = CapacityStore::from_config(&config);
        let mut queue = DemandQueue::new();
        let id = queue.submit_pinned("nowhere", shape("inference", 1), 2).unwrap();

        let outcome = clear(&config, &mut store, queue.take());
        let entry = outcome.plan.unsatisfied_pinned(id).unwrap();
        assert_eq!(entry.unsatisfied_quantity, 2);
        assert_eq!(entry.reason, UnsatisfiedReason::UnknownCluster);
        assert_eq!(store.cluster("a").unwrap().used_gpus(), 0);
    }

    #[test]
    fn pinned_on_closed_cluster_reports_market_closed() {
        let config = MarketConfig::new(vec![cluster("a", 2, 2, 0.2), cluster("b", 2, 0, 0.2)]);
        let mut store = CapacityStore::from_config(&config);
        let mut queue = DemandQueue::new();
        let id = queue.submit_pinned("a", shape("inference", 1), 1).unwrap();

        let outcome = clear(&config, &mut store, queue.take());
        assert!(outcome.plan.satisfied_pinned(id).is_none());
        assert_eq!(
            outcome.plan.unsatisfied_pinned(id).unwrap().reason,
            UnsatisfiedReason::MarketClosed
        );
        // Never redirected to b.
        assert_eq!(store.cluster("b").unwrap().used_gpus(), 0);
    }

    #[test]
    fn pinned_gpus_raise_marginal_price_for_floating() {
        // Identical clusters; pinned load on a pushes floating to b even
        // though a still has room.
        let config = MarketConfig::new(vec![cluster("a", 2, 0, 0.2), cluster("b", 2, 0, 0.2)]);
        let mut store = CapacityStore::from_config(&config);
        let mut queue = DemandQueue::new();
        queue.submit_pinned("a", shape("training_batch", 4), 3).unwrap();
        let id = queue.submit_floating(shape("inference", 1), 1).unwrap();

        let outcome = clear(&config, &mut store, queue.take());
        let entry = outcome.plan.satisfied_floating(id).unwrap();
        assert_eq!(entry.allocations.get("b"), Some(&1));
        assert_eq!(store.cluster("a").unwrap().free_gpus(), 4);
    }

    #[test]
    fn equal_marginal_price_goes_to_first_cluster() {
        let config = MarketConfig::new(vec![cluster("a", 2, 0, 0.2), cluster("b", 2, 0, 0.2)]);
        let mut store = CapacityStore::from_config(&config);
        let mut queue = DemandQueue::new();
        let id = queue.submit_floating(shape("inference", 1), 1).unwrap();

        let outcome = clear(&config, &mut store, queue.take());
        assert_eq!(outcome.plan.satisfied_floating(id).unwrap().allocations.get("a"), Some(&1));
    }

    #[test]
    fn floating_units_alternate_as_prices_move() {
        // Both clusters sit at the price floor for small demand, then a's
        // price rises above b's once it carries more load.
        let config = MarketConfig::new(vec![cluster("a", 1, 0, 0.2), cluster("b", 1, 0, 0.2)]);
        let mut store = CapacityStore::from_config(&config);
        let mut queue = DemandQueue::new();
        let id = queue.submit_floating(shape("training_batch", 4), 4).unwrap();

        let outcome = clear(&config, &mut store, queue.take());
        let entry = outcome.plan.satisfied_floating(id).unwrap();
        assert_eq!(entry.satisfied_quantity, 4);
        assert_eq!(entry.allocations.get("a"), Some(&2));
        assert_eq!(entry.allocations.get("b"), Some(&2));
        assert!(outcome.plan.unsatisfied_floating(id).is_none());
    }

    #[test]
    fn floating_shortfall_is_aggregated_per_request() {
        let config = MarketConfig::new(vec![cluster("a", 1, 0, 0.2)]);
        let mut store = CapacityStore::from_config(&config);
        let mut queue = DemandQueue::new();
        let id = queue.submit_floating(shape("training_batch", 4), 5).unwrap();

        let outcome = clear(&config, &mut store, queue.take());
        assert_eq!(outcome.plan.satisfied_floating(id).unwrap().satisfied_quantity, 2);
        let unsatisfied = outcome.plan.unsatisfied_floating(id).unwrap();
        assert_eq!(unsatisfied.unsatisfied_quantity, 3);
        assert_eq!(unsatisfied.reason, UnsatisfiedReason::CapacityExhausted);
    }

    #[test]
    fn floating_stops_once_nothing_fits() {
        let config = MarketConfig::new(vec![cluster("a", 1, 0, 0.2), cluster("b", 1, 0, 0.2)]);
        let mut store = CapacityStore::from_config(&config);
        let mut queue = DemandQueue::new();
        let id = queue.submit_floating(shape("training_batch", 4), u32::MAX).unwrap();
        let after = queue.submit_floating(shape("inference", 1), 1).unwrap();

        let outcome = clear(&config, &mut store, queue.take());
        assert_eq!(outcome.plan.satisfied_floating(id).unwrap().satisfied_quantity, 4);
        let entry = outcome.plan.unsatisfied_floating(id).unwrap();
        assert_eq!(entry.unsatisfied_quantity, u32::MAX - 4);
        assert_eq!(entry.reason, UnsatisfiedReason::CapacityExhausted);
        assert_eq!(
            outcome.plan.unsatisfied_floating(after).unwrap().unsatisfied_quantity,
            1
        );
    }

    #[test]
    fn floating_with_every_market_closed() {
        let config = MarketConfig::new(vec![cluster("a", 2, 2, 0.2)]);
        let mut store = CapacityStore::from_config(&config);
        let mut queue = DemandQueue::new();
        let id = queue.submit_floating(shape("inference", 1), 3).unwrap();

        let outcome = clear(&config, &mut store, queue.take());
        let entry = outcome.plan.unsatisfied_floating(id).unwrap();
        assert_eq!(entry.unsatisfied_quantity, 3);
        assert_eq!(entry.reason, UnsatisfiedReason::MarketClosed);
        assert_eq!(outcome.prices.spot("a"), Some(f64::INFINITY));
    }

    #[test]
    fn final_spot_price_uses_final_allocation() {
        let config = MarketConfig::new(vec![cluster("a", 2, 0, 0.2)]);
        let mut store = CapacityStore::from_config(&config);
        let mut queue = DemandQueue::new();
        queue.submit_pinned("a", shape("training_batch", 4), 3).unwrap();

        let outcome = clear(&config, &mut store, queue.take());
        let expected = spot_price(&config.clusters[0], 8, 12);
        assert_eq!(outcome.prices.spot("a"), Some(expected));
        assert_eq!(outcome.prices.guaranteed("a"), Some(1.0));
    }

    #[test]
    fn carried_over_capacity_is_counted() {
        let config = MarketConfig::new(vec![cluster("a", 2, 0, 0.2)]);
        let mut store = CapacityStore::from_config(&config);

        let mut queue = DemandQueue::new();
        queue.submit_pinned("a", shape("large_training", 8), 1).unwrap();
        clear(&config, &mut store, queue.take());

        let outcome = clear(&config, &mut store, DemandBatch::default());
        let summary = &outcome.clusters[0];
        assert_eq!(summary.carried_over_gpus, 8);
        assert_eq!(summary.allocated_gpus(), 0);
        assert_eq!(summary.used_gpus, 8);
        assert_eq!(outcome.prices.spot("a"), Some(spot_price(&config.clusters[0], 8, 8)));
    }
}
