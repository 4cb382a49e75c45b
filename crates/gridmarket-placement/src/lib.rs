//! gridmarket-placement — spot capacity and first-fit bin-packing.
//!
//! # Components
//!
//! - **`capacity`** — per-cluster machine list with remaining GPUs
//! - **`packer`** — first-fit `can_fit` / `try_place`

pub mod capacity;
pub mod packer;

pub use capacity::{CapacityStore, ClusterCapacity, ClusterUsage, Machine};
pub use packer::{can_fit, first_fit, try_place};
