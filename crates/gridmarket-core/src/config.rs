//! market.toml configuration parser.
//!
//! ```toml
//! [market]
//! gpus_per_machine = 8
//!
//! [[shapes]]
//! name = "inference"
//! gpus = 1
//!
//! [[clusters]]
//! id = "us-east-1"
//! total_machines = 128
//! guaranteed_machines = 38
//! base_guaranteed = 1.00
//! base_spot = 0.20
//! sensitivity_g = 2.0
//! sensitivity_s = 1.2
//! ```
//!
//! `[[shapes]]` may be omitted, in which case the default catalog is used.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::types::{ClusterConfig, DEFAULT_GPUS_PER_MACHINE, ShapeCatalog};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketConfig {
    #[serde(default)]
    pub market: MarketSettings,
    #[serde(default)]
    pub shapes: ShapeCatalog,
    /// Clusters in enumeration order. Ties during clearing go to the
    /// cluster listed first.
    pub clusters: Vec<ClusterConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketSettings {
    #[serde(default = "default_gpus_per_machine")]
    pub gpus_per_machine: u32,
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            gpus_per_machine: DEFAULT_GPUS_PER_MACHINE,
        }
    }
}

fn default_gpus_per_machine() -> u32 {
    DEFAULT_GPUS_PER_MACHINE
}

impl MarketConfig {
    /// Build a config from clusters, with default settings and shapes.
    pub fn new(clusters: Vec<ClusterConfig>) -> Self {
        Self {
            market: MarketSettings::default(),
            shapes: ShapeCatalog::default(),
            clusters,
        }
    }

    /// Read, parse and validate a market.toml.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a market config from TOML text.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: MarketConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn gpus_per_machine(&self) -> u32 {
        self.market.gpus_per_machine
    }

    pub fn cluster(&self, id: &str) -> Option<&ClusterConfig> {
        self.clusters.iter().find(|c| c.id == id)
    }

    /// Validate every cluster and shape plus cross-cluster invariants.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.market.gpus_per_machine == 0 {
            return Err(ConfigError::ZeroGpusPerMachine);
        }
        if self.clusters.is_empty() {
            return Err(ConfigError::NoClusters);
        }

        let mut seen = HashSet::new();
        for cluster in &self.clusters {
            cluster.validate()?;
            if !seen.insert(cluster.id.as_str()) {
                return Err(ConfigError::DuplicateCluster(cluster.id.clone()));
            }
        }

        self.shapes.validate()
    }
}
