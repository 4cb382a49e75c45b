use std::path::Path;

use gridmarket_pricing::PriceList;

use super::validate::load_config;

pub fn prices(config: &Path, format: &str) -> anyhow::Result<()> {
    let market = load_config(config)?;
    let prices = PriceList::idle(&market);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&prices)?);
        }
        _ => {
            println!("Idle prices:\n");
            print!("{}", super::report::format_prices(&prices));
        }
    }

    Ok(())
}
