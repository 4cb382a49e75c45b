//! Price model — guaranteed and spot prices as functions of utilization.
//!
//! ```text
//! guaranteed = base_guaranteed * (1 + guaranteed_machines / total_machines) ^ sensitivity_g
//!
//! supply     = spot_machines * gpus_per_machine
//! demand     = max(allocated_gpus, MIN_SPOT_DEMAND)
//! spot       = clamp(base_spot * (demand / supply) ^ sensitivity_s,
//!                    SPOT_FLOOR_FACTOR * base_spot,
//!                    SPOT_CEILING_FACTOR * base_spot)
//! ```
//!
//! A cluster without spot supply is closed: its spot price is `+inf`.

use gridmarket_core::ClusterConfig;

/// Lower bound of the spot price as a multiple of `base_spot`.
pub const SPOT_FLOOR_FACTOR: f64 = 0.5;

/// Upper bound of the spot price as a multiple of `base_spot`.
pub const SPOT_CEILING_FACTOR: f64 = 10.0;

/// Demand used in place of zero so an idle cluster is still priced.
pub const MIN_SPOT_DEMAND: f64 = 0.1;

/// Price of newly sold guaranteed capacity for `cluster`.
///
/// Strictly increasing in the reservation ratio. `total_machines` must be
/// non-zero, which [`ClusterConfig::validate`] guarantees.
pub fn guaranteed_price(cluster: &ClusterConfig) -> f64 {
    cluster.base_guaranteed * (1.0 + cluster.reservation_ratio()).powf(cluster.sensitivity_g)
}

/// Spot price for `cluster` with `allocated_gpus` of its spot pool in use.
///
/// Returns `f64::INFINITY` when the cluster has no spot supply.
pub fn spot_price(cluster: &ClusterConfig, gpus_per_machine: u32, allocated_gpus: u64) -> f64 {
    let supply = cluster.spot_supply_gpus(gpus_per_machine);
    if supply == 0 {
        return f64::INFINITY;
    }

    let demand = (allocated_gpus as f64).max(MIN_SPOT_DEMAND);
    let ratio = demand / supply as f64;
    let price = cluster.base_spot * ratio.powf(cluster.sensitivity_s);

    price.clamp(
        cluster.base_spot * SPOT_FLOOR_FACTOR,
        cluster.base_spot * SPOT_CEILING_FACTOR,
    )
}

/// Whether the spot market of `cluster` is closed for lack of supply.
pub fn is_market_closed(cluster: &ClusterConfig) -> bool {
    cluster.spot_machines() == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(total: u32, guaranteed: u32) -> ClusterConfig {
        ClusterConfig {
            id: "c".to_string(),
            total_machines: total,
            guaranteed_machines: guaranteed,
            base_guaranteed: 1.0,
            base_spot: 0.2,
            sensitivity_g: 2.0,
            sensitivity_s: 1.2,
        }
    }

    #[test]
    fn guaranteed_price_without_reservations_is_base() {
        assert_eq!(guaranteed_price(&cluster(10, 0)), 1.0);
    }

    #[test]
    fn guaranteed_price_matches_formula() {
        // (1 + 0.5)^2 = 2.25
        let price = guaranteed_price(&cluster(10, 5));
        assert!((price - 2.25).abs() < 1e-12);
    }

    #[test]
    fn guaranteed_price_strictly_increasing_in_reservations() {
        let mut last = f64::NEG_INFINITY;
        for guaranteed in 0..=16 {
            let price = guaranteed_price(&cluster(16, guaranteed));
            assert!(price > last, "price must rise at guaranteed={guaranteed}");
            last = price;
        }
    }

    #[test]
    fn spot_price_closed_market_is_infinite() {
        let c = cluster(4, 4);
        assert!(is_market_closed(&c));
        assert_eq!(spot_price(&c, 8, 0), f64::INFINITY);
        assert_eq!(spot_price(&c, 8, 100), f64::INFINITY);
    }

    #[test]
    fn spot_price_idle_cluster_hits_floor() {
        let c = cluster(2, 0);
        assert!((spot_price(&c, 8, 0) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn spot_price_full_cluster_is_base() {
        // ratio 1.0 → base_spot, inside the clamp.
        let c = cluster(2, 0);
        assert!((spot_price(&c, 8, 16) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn spot_price_midrange_matches_formula() {
        let c = cluster(2, 0);
        let expected = 0.2 * (12.0_f64 / 16.0).powf(1.2);
        assert!((spot_price(&c, 8, 12) - expected).abs() < 1e-12);
    }

    #[test]
    fn spot_price_capped_at_ceiling() {
        let c = cluster(1, 0);
        // 8 GPUs of supply, ratio 1000 / 8 → far above the ceiling.
        assert!((spot_price(&c, 8, 1000) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn spot_price_stays_within_bounds() {
        let c = cluster(3, 1);
        for allocated in 0..=200 {
            let price = spot_price(&c, 8, allocated);
            assert!(price >= 0.2 * SPOT_FLOOR_FACTOR - 1e-12);
            assert!(price <= 0.2 * SPOT_CEILING_FACTOR + 1e-12);
        }
    }

    #[test]
    fn prices_are_pure() {
        let c = cluster(7, 3);
        assert_eq!(guaranteed_price(&c), guaranteed_price(&c));
        assert_eq!(spot_price(&c, 8, 9), spot_price(&c, 8, 9));
    }
}
