use std::path::Path;

use anyhow::Context;
use gridmarket_core::MarketConfig;

pub fn validate(config: &Path) -> anyhow::Result<()> {
    let market = load_config(config)?;
    println!("✓ {} is valid", config.display());
    println!();
    print!("{}", super::report::format_market(&market));
    Ok(())
}

/// Load and validate a market config, naming the file on failure.
pub fn load_config(path: &Path) -> anyhow::Result<MarketConfig> {
    MarketConfig::from_file(path)
        .with_context(|| format!("failed to load market config {}", path.display()))
}
