//! gridmarket-pricing — utilization-driven price model.
//!
//! Pure functions: the same cluster and allocation always produce the
//! same price. The clearing engine calls them repeatedly while placing
//! floating demand and once more to quote the period's final prices.

pub mod model;
pub mod price_list;

pub use model::{
    MIN_SPOT_DEMAND, SPOT_CEILING_FACTOR, SPOT_FLOOR_FACTOR, guaranteed_price, is_market_closed,
    spot_price,
};
pub use price_list::{ClusterPrices, PriceList};
