//! Per-period price list.
//!
//! Entries keep cluster enumeration order. Serializes as
//! `{"guaranteed_prices": {id: price}, "spot_prices": {id: price | null}}`,
//! where `null` marks a closed spot market.

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};

use gridmarket_core::{ClusterId, MarketConfig};

use crate::model::{guaranteed_price, spot_price};

/// Prices quoted for one cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterPrices {
    pub cluster: ClusterId,
    pub guaranteed: f64,
    /// `f64::INFINITY` when the spot market is closed.
    pub spot: f64,
}

impl ClusterPrices {
    pub fn spot_available(&self) -> bool {
        self.spot.is_finite()
    }
}

/// Guaranteed and spot prices for every cluster, valid for one period.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceList {
    entries: Vec<ClusterPrices>,
}

impl PriceList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cluster: impl Into<ClusterId>, guaranteed: f64, spot: f64) {
        self.entries.push(ClusterPrices {
            cluster: cluster.into(),
            guaranteed,
            spot,
        });
    }

    /// Quote every cluster in `config` with no spot demand allocated.
    pub fn idle(config: &MarketConfig) -> Self {
        let mut list = Self::new();
        for cluster in &config.clusters {
            list.push(
                cluster.id.clone(),
                guaranteed_price(cluster),
                spot_price(cluster, config.gpus_per_machine(), 0),
            );
        }
        list
    }

    pub fn get(&self, cluster: &str) -> Option<&ClusterPrices> {
        self.entries.iter().find(|e| e.cluster == cluster)
    }

    pub fn guaranteed(&self, cluster: &str) -> Option<f64> {
        self.get(cluster).map(|e| e.guaranteed)
    }

    pub fn spot(&self, cluster: &str) -> Option<f64> {
        self.get(cluster).map(|e| e.spot)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClusterPrices> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone, Copy)]
enum Column {
    Guaranteed,
    Spot,
}

struct PriceColumn<'a> {
    entries: &'a [ClusterPrices],
    column: Column,
}

impl Serialize for PriceColumn<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in self.entries {
            let price = match self.column {
                Column::Guaranteed => entry.guaranteed,
                Column::Spot => entry.spot,
            };
            let price = price.is_finite().then_some(price);
            map.serialize_entry(&entry.cluster, &price)?;
        }
        map.end()
    }
}

impl Serialize for PriceList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("PriceList", 2)?;
        s.serialize_field(
            "guaranteed_prices",
            &PriceColumn {
                entries: &self.entries,
                column: Column::Guaranteed,
            },
        )?;
        s.serialize_field(
            "spot_prices",
            &PriceColumn {
                entries: &self.entries,
                column: Column::Spot,
            },
        )?;
        s.end()
    }
}
