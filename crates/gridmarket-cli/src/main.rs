use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "gridmarket",
    about = "GridMarket — multi-cluster GPU compute market",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Emit logs as JSON lines instead of plain text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate a market.toml
    Validate {
        #[arg(short, long, default_value = "market.toml")]
        config: PathBuf,
    },
    /// Print guaranteed prices and idle spot prices
    Prices {
        #[arg(short, long, default_value = "market.toml")]
        config: PathBuf,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Clear one period of demand.
    ///
    /// Demand files may be TOML or JSON, chosen by extension. Pinned
    /// entries are queued before floating entries.
    Clear {
        #[arg(short, long, default_value = "market.toml")]
        config: PathBuf,
        /// Demand file (.toml or .json)
        #[arg(short, long)]
        demand: PathBuf,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Clear several periods against one persistent market.
    ///
    /// Capacity carries over between periods. A period with
    /// `release = true` frees every machine before it clears.
    Simulate {
        #[arg(short, long, default_value = "market.toml")]
        config: PathBuf,
        /// Periods file with one [[periods]] table per period
        #[arg(short, long)]
        periods: PathBuf,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("gridmarket=info".parse()?);
    let logs = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.json {
        logs.json().init();
    } else {
        logs.init();
    }

    match cli.command {
        Commands::Validate { config } => commands::validate::validate(&config),
        Commands::Prices { config, format } => commands::prices::prices(&config, &format),
        Commands::Clear {
            config,
            demand,
            format,
        } => commands::clear::clear(&config, &demand, &format),
        Commands::Simulate {
            config,
            periods,
            format,
        } => commands::simulate::simulate(&config, &periods, &format),
    }
}
