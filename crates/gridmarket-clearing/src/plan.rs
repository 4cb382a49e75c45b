//! Allocation plan — what each request got in one period.
//!
//! Produced once per clearing run and never mutated afterward. A request
//! that is partly served appears in both the satisfied and the
//! unsatisfied list of its class.

use std::collections::BTreeMap;

use serde::Serialize;

use gridmarket_core::{ClusterId, RequestId};

/// Why some or all of a request could not be placed.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnsatisfiedReason {
    /// No machine had enough remaining GPUs.
    CapacityExhausted,
    /// The target cluster (or every cluster, for floating demand) has no
    /// spot supply.
    MarketClosed,
    /// A pinned request named a cluster the market does not have.
    UnknownCluster,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SatisfiedPinned {
    pub id: RequestId,
    pub cluster: ClusterId,
    pub shape: String,
    pub requested_quantity: u32,
    pub satisfied_quantity: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UnsatisfiedPinned {
    pub id: RequestId,
    pub cluster: ClusterId,
    pub shape: String,
    pub requested_quantity: u32,
    pub unsatisfied_quantity: u32,
    pub reason: UnsatisfiedReason,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SatisfiedFloating {
    pub id: RequestId,
    pub shape: String,
    pub requested_quantity: u32,
    pub satisfied_quantity: u32,
    /// Cluster → instances placed there.
    pub allocations: BTreeMap<ClusterId, u32>,
}

impl SatisfiedFloating {
    pub(crate) fn new(id: RequestId, shape: &str, requested_quantity: u32) -> Self {
        Self {
            id,
            shape: shape.to_string(),
            requested_quantity,
            satisfied_quantity: 0,
            allocations: BTreeMap::new(),
        }
    }

    pub(crate) fn record(&mut self, cluster: &str) {
        *self.allocations.entry(cluster.to_string()).or_insert(0) += 1;
        self.satisfied_quantity += 1;
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UnsatisfiedFloating {
    pub id: RequestId,
    pub shape: String,
    pub requested_quantity: u32,
    pub unsatisfied_quantity: u32,
    pub reason: UnsatisfiedReason,
}

/// Entries split by demand class.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ByClass<P, F> {
    pub pinned: Vec<P>,
    pub floating: Vec<F>,
}

impl<P, F> Default for ByClass<P, F> {
    fn default() -> Self {
        Self {
            pinned: Vec::new(),
            floating: Vec::new(),
        }
    }
}

impl<P, F> ByClass<P, F> {
    pub fn is_empty(&self) -> bool {
        self.pinned.is_empty() && self.floating.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct AllocationPlan {
    pub satisfied_demand: ByClass<SatisfiedPinned, SatisfiedFloating>,
    pub unsatisfied_demand: ByClass<UnsatisfiedPinned, UnsatisfiedFloating>,
}

impl AllocationPlan {
    pub fn satisfied_pinned(&self, id: RequestId) -> Option<&SatisfiedPinned> {
        self.satisfied_demand.pinned.iter().find(|e| e.id == id)
    }

    pub fn unsatisfied_pinned(&self, id: RequestId) -> Option<&UnsatisfiedPinned> {
        self.unsatisfied_demand.pinned.iter().find(|e| e.id == id)
    }

    pub fn satisfied_floating(&self, id: RequestId) -> Option<&SatisfiedFloating> {
        self.satisfied_demand.floating.iter().find(|e| e.id == id)
    }

    pub fn unsatisfied_floating(&self, id: RequestId) -> Option<&UnsatisfiedFloating> {
        self.unsatisfied_demand.floating.iter().find(|e| e.id == id)
    }

    /// Job instances placed across both classes.
    pub fn satisfied_instances(&self) -> u64 {
        self.satisfied_demand
            .pinned
            .iter()
            .map(|e| u64::from(e.satisfied_quantity))
            .chain(
                self.satisfied_demand
                    .floating
                    .iter()
                    .map(|e| u64::from(e.satisfied_quantity)),
            )
            .sum()
    }

    /// Job instances left unplaced across both classes.
    pub fn unsatisfied_instances(&self) -> u64 {
        self.unsatisfied_demand
            .pinned
            .iter()
            .map(|e| u64::from(e.unsatisfied_quantity))
            .chain(
                self.unsatisfied_demand
                    .floating
                    .iter()
                    .map(|e| u64::from(e.unsatisfied_quantity)),
            )
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floating_record_accumulates_per_cluster() {
        let mut entry = SatisfiedFloating::new(4, "inference", 3);
        entry.record("a");
        entry.record("b");
        entry.record("a");
        assert_eq!(entry.satisfied_quantity, 3);
        assert_eq!(entry.allocations.get("a"), Some(&2));
        assert_eq!(entry.allocations.get("b"), Some(&1));
    }

    #[test]
    fn plan_serializes_with_class_split() {
        let mut plan = AllocationPlan::default();
        plan.unsatisfied_demand.pinned.push(UnsatisfiedPinned {
            id: 1,
            cluster: "a".to_string(),
            shape: "large_training".to_string(),
            requested_quantity: 3,
            unsatisfied_quantity: 1,
            reason: UnsatisfiedReason::CapacityExhausted,
        });

        let json = serde_json::to_value(&plan).unwrap();
        assert!(json["satisfied_demand"]["pinned"].as_array().unwrap().is_empty());
        assert_eq!(json["unsatisfied_demand"]["pinned"][0]["unsatisfied_quantity"], 1);
        assert_eq!(json["unsatisfied_demand"]["pinned"][0]["reason"], "capacity_exhausted");
        assert_eq!(plan.unsatisfied_instances(), 1);
        assert_eq!(plan.satisfied_instances(), 0);
    }
}
