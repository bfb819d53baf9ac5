// CLI definitions using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "arctis_monitor")]
#[command(author, version, about = "SteelSeries Arctis battery monitor")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Device path pattern (overrides the config file)
    #[arg(long, global = true, value_name = "PATTERN")]
    pub pattern: Option<String>,

    /// Config file (default: ~/.config/arctis-monitor/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Show the raw frame and hex tokens with each reading
    #[arg(short, long, global = true)]
    pub diagnostic: bool,

    /// Keep searching when the device is absent at startup
    #[arg(long, global = true)]
    pub wait: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Poll the headset and show status and battery (default)
    #[command(visible_alias = "m")]
    Monitor,

    /// List HID devices and mark the one the pattern selects
    #[command(visible_alias = "ls")]
    List,

    /// Decode a captured frame given as hex bytes (e.g. "06 12 03 32")
    Decode {
        #[arg(required = true, num_args = 1..)]
        dump: Vec<String>,
    },
}
