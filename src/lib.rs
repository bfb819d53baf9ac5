//! Arctis battery monitor - shared library
//!
//! The binary wires these pieces to the hidapi transport; tests drive the
//! same [`Monitor`] with scripted devices.

pub mod config;
pub mod monitor;
pub mod presenter;

pub use config::MonitorConfig;
pub use monitor::{
    shutdown_channel, Backoff, Monitor, MonitorError, MonitorSettings, MonitorState,
    MonitorStats, Shutdown, ShutdownTrigger,
};
pub use presenter::{format_reading, Notice, Presenter, TerminalPresenter};
