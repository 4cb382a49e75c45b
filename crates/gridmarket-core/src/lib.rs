//! gridmarket-core — shared types for the multi-cluster GPU market.
//!
//! - **`types`** — cluster configuration and workload shapes
//! - **`config`** — market.toml parsing and validation
//! - **`demand`** — pinned/floating requests and the demand queue
//! - **`error`** — configuration and demand errors

pub mod config;
pub mod demand;
pub mod error;
pub mod types;

pub use config::{MarketConfig, MarketSettings};
pub use demand::{
    DemandBatch, DemandFile, DemandQueue, DemandRequest, FloatingEntry, FloatingRequest,
    PinnedEntry, PinnedRequest,
};
pub use error::{ConfigError, ConfigResult, DemandError, DemandResult};
pub use types::*;
