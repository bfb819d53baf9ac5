//! Utility command handlers

use anyhow::Context;
use arctis_monitor::MonitorConfig;
use arctis_transport::{decode_hex, select_device, DeviceDiscovery, DevicePattern, HidDiscovery};

use super::CommandResult;

/// List all HID devices, marking the selected device with `*` and other
/// matches with `+`
pub async fn list(config: &MonitorConfig) -> CommandResult {
    let pattern = DevicePattern::new(&config.device.pattern)?;
    let discovery = HidDiscovery::new()?;
    let devices = discovery.list_devices().await?;
    let selected = select_device(&devices, &pattern).map(|d| d.path.clone());

    println!("All HID devices (pattern {pattern}):");
    if let Some(ids) = pattern.ids() {
        println!("  ids on paths without vid_: {ids}");
    }
    for device in &devices {
        let mark = if selected.as_deref() == Some(device.path.as_str()) {
            '*'
        } else if pattern.matches(device) {
            '+'
        } else {
            ' '
        };
        println!(
            "{} VID={:04x} PID={:04x} if={} usage={:04x} page={:04x} {} path={}",
            mark,
            device.vid,
            device.pid,
            device.interface_number,
            device.usage,
            device.usage_page,
            device.friendly_name(),
            device.path,
        );
    }
    if selected.is_none() {
        println!("No device matches {pattern}");
    }
    Ok(())
}

/// Decode a captured frame dump and print its fields
pub fn decode(dump: &str) -> CommandResult {
    let record = decode_hex(dump).with_context(|| format!("Cannot decode \"{dump}\""))?;
    println!("Status: {}", record.status);
    println!("Battery: {}%", record.battery_percent);
    Ok(())
}
