//! Domain types shared by every gridmarket crate.
//!
//! Clusters and shapes are plain serializable values. Collections that
//! carry an iteration order (clusters in a config, shapes in a catalog)
//! are `Vec`s so the order written in the config is the order used for
//! tie-breaking during clearing.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Unique identifier for a cluster.
pub type ClusterId = String;

/// Unique identifier for a demand request.
pub type RequestId = u64;

/// GPUs on every machine unless the config says otherwise.
pub const DEFAULT_GPUS_PER_MACHINE: u32 = 8;

// ── Cluster ───────────────────────────────────────────────────────

/// Static configuration of one cluster selling GPU capacity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterConfig {
    pub id: ClusterId,
    /// Machines in the cluster, reserved or not.
    pub total_machines: u32,
    /// Machines sold under guaranteed contracts. Never part of the spot pool.
    pub guaranteed_machines: u32,
    /// Base price per unit for guaranteed capacity.
    pub base_guaranteed: f64,
    /// Base price per unit for spot capacity.
    pub base_spot: f64,
    /// Exponent applied to the reservation ratio for guaranteed pricing.
    pub sensitivity_g: f64,
    /// Exponent applied to the demand/supply ratio for spot pricing.
    pub sensitivity_s: f64,
}

impl ClusterConfig {
    /// Machines available to the spot market.
    pub fn spot_machines(&self) -> u32 {
        self.total_machines.saturating_sub(self.guaranteed_machines)
    }

    /// Spot supply in GPUs for the given machine size.
    pub fn spot_supply_gpus(&self, gpus_per_machine: u32) -> u64 {
        u64::from(self.spot_machines()) * u64::from(gpus_per_machine)
    }

    /// Fraction of machines sold as guaranteed capacity.
    ///
    /// Returns 0.0 for a cluster without machines; such a config never
    /// passes [`ClusterConfig::validate`].
    pub fn reservation_ratio(&self) -> f64 {
        if self.total_machines == 0 {
            return 0.0;
        }
        f64::from(self.guaranteed_machines) / f64::from(self.total_machines)
    }

    /// Check the invariants a cluster must satisfy before it can be priced.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::EmptyClusterId);
        }
        if self.total_machines == 0 {
            return Err(ConfigError::ZeroMachines(self.id.clone()));
        }
        if self.guaranteed_machines > self.total_machines {
            return Err(ConfigError::GuaranteedExceedsTotal {
                cluster: self.id.clone(),
                guaranteed: self.guaranteed_machines,
                total: self.total_machines,
            });
        }

        let params = [
            ("base_guaranteed", self.base_guaranteed),
            ("base_spot", self.base_spot),
            ("sensitivity_g", self.sensitivity_g),
            ("sensitivity_s", self.sensitivity_s),
        ];
        for (field, value) in params {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidParameter {
                    cluster: self.id.clone(),
                    field,
                    value,
                });
            }
        }
        Ok(())
    }
}

// ── Workload shapes ───────────────────────────────────────────────

/// A named unit of demand with a fixed GPU requirement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct WorkloadShape {
    pub name: String,
    pub gpus: u32,
}

impl WorkloadShape {
    pub fn new(name: impl Into<String>, gpus: u32) -> Self {
        Self {
            name: name.into(),
            gpus,
        }
    }
}

/// Immutable catalog of the shapes demand may be expressed in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ShapeCatalog(Vec<WorkloadShape>);

impl ShapeCatalog {
    pub fn new(shapes: Vec<WorkloadShape>) -> Self {
        Self(shapes)
    }

    /// Look up a shape by name.
    pub fn get(&self, name: &str) -> Option<&WorkloadShape> {
        self.0.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkloadShape> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reject empty names, zero-GPU shapes and duplicates.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut seen = std::collections::HashSet::new();
        for shape in &self.0 {
            if shape.name.trim().is_empty() {
                return Err(ConfigError::InvalidShape("shape name must not be empty".to_string()));
            }
            if shape.gpus == 0 {
                return Err(ConfigError::InvalidShape(format!(
                    "{} requires zero GPUs",
                    shape.name
                )));
            }
            if !seen.insert(shape.name.as_str()) {
                return Err(ConfigError::DuplicateShape(shape.name.clone()));
            }
        }
        Ok(())
    }
}

impl Default for ShapeCatalog {
    /// inference (1 GPU), training_batch (4 GPUs), large_training (8 GPUs).
    fn default() -> Self {
        Self(vec![
            WorkloadShape::new("inference", 1),
            WorkloadShape::new("training_batch", 4),
            WorkloadShape::new("large_training", 8),
        ])
    }
}
