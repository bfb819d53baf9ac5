//! Arctis Battery Monitor CLI
//!
//! Polls a SteelSeries Arctis wireless base station and shows headset
//! status and battery level.

use clap::Parser;
use tracing_subscriber::EnvFilter;

// CLI definitions
mod cli;
use cli::{Cli, Commands};

// Command handlers
mod commands;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so they never interleave with the readout
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = commands::load_config(&cli)?;

    match cli.command {
        None | Some(Commands::Monitor) => {
            commands::monitor::run(config).await?;
        }
        Some(Commands::List) => {
            commands::utility::list(&config).await?;
        }
        Some(Commands::Decode { dump }) => {
            commands::utility::decode(&dump.join(" "))?;
        }
    }

    Ok(())
}
