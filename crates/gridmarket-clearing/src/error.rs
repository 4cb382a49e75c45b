//! Market error types.

use thiserror::Error;

use gridmarket_core::ConfigError;

/// Errors raised by market setup and capacity management.
///
/// Clearing itself never fails; shortfalls are reported in the plan.
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("unknown cluster: {0}")]
    UnknownCluster(String),
}

pub type MarketResult<T> = Result<T, MarketError>;
