use std::path::Path;

use anyhow::Context;
use gridmarket_clearing::{Market, PeriodReport};
use gridmarket_core::{DemandFile, DemandQueue};

use super::validate::load_config;

pub fn clear(config: &Path, demand: &Path, format: &str) -> anyhow::Result<()> {
    let report = clear_files(config, demand)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            print!("{}", super::report::format_period(&report));
        }
    }

    Ok(())
}

/// Clear the demand in `demand` as the first period of a fresh market.
pub fn clear_files(config: &Path, demand: &Path) -> anyhow::Result<PeriodReport> {
    let mut market = Market::new(load_config(config)?)?;
    let file = DemandFile::from_file(demand)
        .with_context(|| format!("failed to load demand file {}", demand.display()))?;

    let mut queue = DemandQueue::new();
    file.enqueue(&market.config().shapes, &mut queue)
        .with_context(|| format!("invalid demand in {}", demand.display()))?;

    Ok(market.clear_queue(&mut queue))
}
