//! Error types for configuration loading and demand intake.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::RequestId;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type alias for demand intake operations.
pub type DemandResult<T> = Result<T, DemandError>;

/// Errors raised while loading or validating a market configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid market config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize market config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("market config defines no clusters")]
    NoClusters,

    #[error("duplicate cluster id: {0}")]
    DuplicateCluster(String),

    #[error("cluster id must not be empty")]
    EmptyClusterId,

    #[error("cluster {0}: total_machines must be greater than zero")]
    ZeroMachines(String),

    #[error("cluster {cluster}: guaranteed_machines ({guaranteed}) exceeds total_machines ({total})")]
    GuaranteedExceedsTotal {
        cluster: String,
        guaranteed: u32,
        total: u32,
    },

    #[error("cluster {cluster}: {field} must be a positive finite number, got {value}")]
    InvalidParameter {
        cluster: String,
        field: &'static str,
        value: f64,
    },

    #[error("gpus_per_machine must be greater than zero")]
    ZeroGpusPerMachine,

    #[error("invalid workload shape: {0}")]
    InvalidShape(String),

    #[error("duplicate workload shape: {0}")]
    DuplicateShape(String),
}

/// Errors raised while building or loading demand requests.
#[derive(Debug, Error)]
pub enum DemandError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid demand file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid demand file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported demand file format: {0} (expected .toml or .json)")]
    UnsupportedFormat(String),

    #[error("request {0}: quantity must be greater than zero")]
    ZeroQuantity(RequestId),

    #[error("request {0}: pinned request has no target cluster")]
    MissingCluster(RequestId),

    #[error("request {id}: shape {shape} requires zero GPUs")]
    ZeroGpuShape { id: RequestId, shape: String },

    #[error("unknown workload shape: {0}")]
    UnknownShape(String),

    #[error("duplicate request id: {0}")]
    DuplicateId(RequestId),

    #[error("request id {0} is out of range")]
    IdOutOfRange(RequestId),
}
