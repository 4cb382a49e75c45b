//! Multi-period simulation against one persistent market.
//!
//! ```toml
//! [[periods]]
//! [[periods.pinned]]
//! cluster = "us-east-1"
//! shape = "large_training"
//! quantity = 2
//!
//! [[periods]]
//! release = true
//! [[periods.floating]]
//! shape = "inference"
//! quantity = 12
//! ```

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::info;

use gridmarket_clearing::{Market, PeriodReport};
use gridmarket_core::{DemandFile, DemandQueue, FloatingEntry, PinnedEntry};

use super::validate::load_config;

#[derive(Debug, Deserialize)]
pub struct SimulationFile {
    #[serde(default)]
    pub periods: Vec<PeriodEntry>,
}

#[derive(Debug, Deserialize)]
pub struct PeriodEntry {
    /// Free every machine before this period clears.
    #[serde(default)]
    pub release: bool,
    #[serde(default)]
    pub pinned: Vec<PinnedEntry>,
    #[serde(default)]
    pub floating: Vec<FloatingEntry>,
}

impl PeriodEntry {
    fn demand(&self) -> DemandFile {
        DemandFile {
            pinned: self.pinned.clone(),
            floating: self.floating.clone(),
        }
    }
}

pub fn simulate(config: &Path, periods: &Path, format: &str) -> anyhow::Result<()> {
    let reports = simulate_files(config, periods)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        _ => {
            for report in &reports {
                print!("{}", super::report::format_period(report));
            }
        }
    }

    Ok(())
}

pub fn simulate_files(config: &Path, periods: &Path) -> anyhow::Result<Vec<PeriodReport>> {
    let mut market = Market::new(load_config(config)?)?;
    let content = std::fs::read_to_string(periods)
        .with_context(|| format!("failed to read periods file {}", periods.display()))?;
    let file: SimulationFile = toml::from_str(&content)
        .with_context(|| format!("failed to parse periods file {}", periods.display()))?;

    info!(periods = file.periods.len(), "starting simulation");

    let mut queue = DemandQueue::new();
    let mut reports = Vec::with_capacity(file.periods.len());
    for (index, entry) in file.periods.iter().enumerate() {
        if entry.release {
            market.release_all();
        }
        entry
            .demand()
            .enqueue(&market.config().shapes, &mut queue)
            .with_context(|| format!("invalid demand in period {}", index + 1))?;
        reports.push(market.clear_queue(&mut queue));
    }

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const MARKET: &str = "[[clusters]]\nid = \"a\"\ntotal_machines = 1\nguaranteed_machines = 0\n\
                          base_guaranteed = 1.0\nbase_spot = 0.2\nsensitivity_g = 2.0\nsensitivity_s = 1.2\n";

    fn write(dir: &Path, periods: &str) -> (std::path::PathBuf, std::path::PathBuf) {
        let config = dir.join("market.toml");
        let file = dir.join("periods.toml");
        fs::write(&config, MARKET).unwrap();
        fs::write(&file, periods).unwrap();
        (config, file)
    }

    #[test]
    fn test_capacity_carries_over() {
        let dir = tempfile::tempdir().unwrap();
        let (config, periods) = write(
            dir.path(),
            "[[periods]]\n[[periods.floating]]\nshape = \"large_training\"\nquantity = 1\n\n\
             [[periods]]\n[[periods.floating]]\nshape = \"inference\"\nquantity = 1\n",
        );

        let reports = simulate_files(&config, &periods).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].allocation_plan.satisfied_instances(), 1);
        assert_eq!(reports[1].period, 2);
        assert_eq!(reports[1].allocation_plan.unsatisfied_instances(), 1);
        assert_eq!(reports[1].clusters[0].carried_over_gpus, 8);
    }

    #[test]
    fn test_release_frees_machines() {
        let dir = tempfile::tempdir().unwrap();
        let (config, periods) = write(
            dir.path(),
            "[[periods]]\n[[periods.floating]]\nshape = \"large_training\"\nquantity = 1\n\n\
             [[periods]]\nrelease = true\n[[periods.floating]]\nshape = \"large_training\"\nquantity = 1\n",
        );

        let reports = simulate_files(&config, &periods).unwrap();
        assert_eq!(reports[1].allocation_plan.satisfied_instances(), 1);
        assert_eq!(reports[1].clusters[0].carried_over_gpus, 0);
        // Ids keep counting across periods.
        assert_eq!(reports[1].allocation_plan.satisfied_demand.floating[0].id, 2);
    }

    #[test]
    fn test_bad_period_is_named() {
        let dir = tempfile::tempdir().unwrap();
        let (config, periods) = write(
            dir.path(),
            "[[periods]]\n\n[[periods]]\n[[periods.pinned]]\ncluster = \"a\"\nshape = \"inference\"\nquantity = 0\n",
        );

        let err = simulate_files(&config, &periods).unwrap_err();
        assert!(err.to_string().contains("period 2"));
    }
}
