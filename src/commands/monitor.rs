//! The monitor command

use std::io::IsTerminal;
use std::time::Duration;

use anyhow::Context;
use arctis_monitor::{shutdown_channel, Monitor, MonitorConfig, MonitorSettings, TerminalPresenter};
use arctis_transport::{DevicePattern, HidDiscovery};
use tracing::info;

use super::CommandResult;

/// Poll the headset until Ctrl+C
pub async fn run(config: MonitorConfig) -> CommandResult {
    let pattern = DevicePattern::new(&config.device.pattern)?;
    let discovery = HidDiscovery::new()?
        .with_read_timeout(Duration::from_millis(config.session.read_timeout_ms));
    let presenter = TerminalPresenter::stdout(config.display.diagnostic);
    // Piped output gets plain blocks without cursor control
    let presenter = if std::io::stdout().is_terminal() {
        presenter
    } else {
        presenter.without_clear()
    };

    let (trigger, shutdown) = shutdown_channel();
    ctrlc::set_handler(move || {
        info!("Received Ctrl+C, shutting down...");
        trigger.trigger();
    })
    .context("Failed to install Ctrl+C handler")?;

    let mut monitor = Monitor::new(
        discovery,
        presenter,
        pattern,
        MonitorSettings::from(&config),
    );
    let stats = monitor.run(shutdown).await?;
    println!("\nStopped after {} readings.", stats.records);
    Ok(())
}
