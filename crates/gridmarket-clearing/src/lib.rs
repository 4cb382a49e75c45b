//! gridmarket-clearing — per-period market clearing.
//!
//! Takes a batch of pinned and floating GPU demand, places it on spot
//! capacity and quotes the period's prices.
//!
//! # Architecture
//!
//! ```text
//! SharedMarket (one run in flight)
//!   └── Market (config, capacity store, period counter)
//!       └── engine::clear
//!           ├── gridmarket-pricing (guaranteed / marginal / final spot prices)
//!           └── gridmarket-placement (first-fit on spot machines)
//! ```

pub mod engine;
pub mod error;
pub mod market;
pub mod plan;
pub mod shared;

pub use engine::{ClearingOutcome, ClusterSummary, clear};
pub use error::{MarketError, MarketResult};
pub use market::{Market, PeriodReport};
pub use plan::{
    AllocationPlan, ByClass, SatisfiedFloating, SatisfiedPinned, UnsatisfiedFloating,
    UnsatisfiedPinned, UnsatisfiedReason,
};
pub use shared::SharedMarket;
