//! Capacity store — remaining GPUs per spot machine per cluster.
//!
//! Only spot-eligible machines are tracked; guaranteed machines never
//! appear here. Clusters keep config order and machines keep creation
//! order, and neither is ever re-sorted, so first-fit placement is
//! reproducible.

use std::collections::BTreeMap;

use serde::Serialize;

use gridmarket_core::{ClusterId, MarketConfig};

/// One spot machine.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Machine {
    /// GPUs the machine was created with.
    pub capacity: u32,
    /// GPUs not yet allocated. Always `<= capacity`.
    pub remaining: u32,
    /// Shape names of the jobs placed on this machine, in placement order.
    pub jobs: Vec<String>,
}

impl Machine {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            remaining: capacity,
            jobs: Vec::new(),
        }
    }

    pub fn used(&self) -> u32 {
        self.capacity - self.remaining
    }

    pub fn fits(&self, gpus: u32) -> bool {
        self.remaining >= gpus
    }

    pub(crate) fn allocate(&mut self, shape: &str, gpus: u32) {
        debug_assert!(self.fits(gpus));
        self.remaining -= gpus;
        self.jobs.push(shape.to_string());
    }

    fn release(&mut self) {
        self.remaining = self.capacity;
        self.jobs.clear();
    }
}

/// Spot machines of a single cluster.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ClusterCapacity {
    pub cluster: ClusterId,
    pub machines: Vec<Machine>,
}

impl ClusterCapacity {
    pub fn new(cluster: impl Into<ClusterId>, machines: u32, gpus_per_machine: u32) -> Self {
        Self {
            cluster: cluster.into(),
            machines: (0..machines).map(|_| Machine::new(gpus_per_machine)).collect(),
        }
    }

    pub fn total_gpus(&self) -> u64 {
        self.machines.iter().map(|m| u64::from(m.capacity)).sum()
    }

    pub fn free_gpus(&self) -> u64 {
        self.machines.iter().map(|m| u64::from(m.remaining)).sum()
    }

    pub fn used_gpus(&self) -> u64 {
        self.total_gpus() - self.free_gpus()
    }

    /// Running jobs per shape name.
    pub fn jobs_by_shape(&self) -> BTreeMap<String, u32> {
        let mut counts = BTreeMap::new();
        for job in self.machines.iter().flat_map(|m| m.jobs.iter()) {
            *counts.entry(job.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Return every machine to full capacity.
    pub fn release(&mut self) {
        for machine in &mut self.machines {
            machine.release();
        }
    }
}

/// Usage summary of one cluster, for rendering availability.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ClusterUsage {
    pub cluster: ClusterId,
    pub machines: usize,
    pub total_gpus: u64,
    pub used_gpus: u64,
    pub free_gpus: u64,
    /// Remaining GPUs per machine, in machine order.
    pub remaining: Vec<u32>,
    pub jobs_by_shape: BTreeMap<String, u32>,
}

/// Spot capacity of every cluster in the market.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CapacityStore {
    gpus_per_machine: u32,
    clusters: Vec<ClusterCapacity>,
}

impl CapacityStore {
    /// Create a store with every spot machine at full capacity.
    pub fn from_config(config: &MarketConfig) -> Self {
        let gpus_per_machine = config.gpus_per_machine();
        let clusters = config
            .clusters
            .iter()
            .map(|c| ClusterCapacity::new(c.id.clone(), c.spot_machines(), gpus_per_machine))
            .collect();
        Self {
            gpus_per_machine,
            clusters,
        }
    }

    pub fn gpus_per_machine(&self) -> u32 {
        self.gpus_per_machine
    }

    pub fn cluster(&self, id: &str) -> Option<&ClusterCapacity> {
        self.clusters.iter().find(|c| c.cluster == id)
    }

    pub fn cluster_mut(&mut self, id: &str) -> Option<&mut ClusterCapacity> {
        self.clusters.iter_mut().find(|c| c.cluster == id)
    }

    pub fn clusters(&self) -> impl Iterator<Item = &ClusterCapacity> {
        self.clusters.iter()
    }

    /// Release all placements in one cluster. Returns `false` if unknown.
    pub fn release_cluster(&mut self, id: &str) -> bool {
        match self.cluster_mut(id) {
            Some(cluster) => {
                cluster.release();
                true
            }
            None => false,
        }
    }

    pub fn release_all(&mut self) {
        for cluster in &mut self.clusters {
            cluster.release();
        }
    }

    /// Per-cluster usage in cluster order.
    pub fn snapshot(&self) -> Vec<ClusterUsage> {
        self.clusters
            .iter()
            .map(|c| ClusterUsage {
                cluster: c.cluster.clone(),
                machines: c.machines.len(),
                total_gpus: c.total_gpus(),
                used_gpus: c.used_gpus(),
                free_gpus: c.free_gpus(),
                remaining: c.machines.iter().map(|m| m.remaining).collect(),
                jobs_by_shape: c.jobs_by_shape(),
            })
            .collect()
    }
}
