//! Command handlers for the CLI application.
//!
//! - `monitor`: the poll loop (default command)
//! - `utility`: device listing and offline frame decoding

pub mod monitor;
pub mod utility;

use arctis_monitor::MonitorConfig;
use tracing::debug;

use crate::cli::Cli;

/// Result type for command handlers
pub type CommandResult = anyhow::Result<()>;

/// Load the config file and apply command-line overrides
pub fn load_config(cli: &Cli) -> anyhow::Result<MonitorConfig> {
    let path = cli.config.clone().unwrap_or_else(MonitorConfig::default_path);
    let mut config = MonitorConfig::load(&path)?;
    debug!("Loaded config from {}", path.display());

    if let Some(pattern) = &cli.pattern {
        config.device.pattern = pattern.clone();
    }
    if cli.wait {
        config.device.wait_for_device = true;
    }
    if cli.diagnostic {
        config.display.diagnostic = true;
    }

    config.validate()?;
    Ok(config)
}
