//! First-fit bin-packer.
//!
//! A job lands on the first machine, in creation order, with enough
//! remaining GPUs. Jobs are never split across machines and machines are
//! never re-sorted, so identical inputs give identical placements.

use tracing::debug;

use gridmarket_core::WorkloadShape;

use crate::capacity::{CapacityStore, ClusterCapacity};

/// Index of the first machine in `cluster` that can hold `gpus`.
pub fn first_fit(cluster: &ClusterCapacity, gpus: u32) -> Option<usize> {
    cluster.machines.iter().position(|m| m.fits(gpus))
}

/// Whether one job of `shape` fits in `cluster` right now.
///
/// Unknown clusters and clusters without spot machines never fit.
pub fn can_fit(store: &CapacityStore, cluster: &str, shape: &WorkloadShape) -> bool {
    store
        .cluster(cluster)
        .is_some_and(|c| first_fit(c, shape.gpus).is_some())
}

/// Place one job of `shape` in `cluster`.
///
/// Returns the index of the machine that took the job, or `None` if no
/// machine has room. Nothing is mutated on failure.
pub fn try_place(store: &mut CapacityStore, cluster: &str, shape: &WorkloadShape) -> Option<usize> {
    let capacity = store.cluster_mut(cluster)?;
    let index = first_fit(capacity, shape.gpus)?;
    let machine = &mut capacity.machines[index];
    machine.allocate(&shape.name, shape.gpus);
    debug!(
        cluster,
        machine = index,
        shape = %shape.name,
        gpus = shape.gpus,
        remaining = machine.remaining,
        "placed job"
    );
    Some(index)
}
