//! Device discovery and matching

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hidapi::HidApi;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::TransportError;
use crate::hid_session::{run_blocking, HidSession};
use crate::pattern::DevicePattern;
use crate::protocol::timing;
use crate::session::BoxedSession;
use crate::types::DeviceDescriptor;

/// Device discovery abstraction
///
/// Stands in for the platform device list so callers never reach for a
/// process-wide HID context directly.
#[async_trait]
pub trait DeviceDiscovery: Send + Sync {
    /// Point-in-time snapshot of the attached HID devices, in platform order
    async fn list_devices(&self) -> Result<Vec<DeviceDescriptor>, TransportError>;

    /// Open a session to a previously listed device
    async fn open_device(&self, device: &DeviceDescriptor)
        -> Result<BoxedSession, TransportError>;
}

/// Pick the device a pattern refers to.
///
/// Path matches win over id matches; within each kind the first device in
/// enumeration order is returned.
pub fn select_device<'a>(
    devices: &'a [DeviceDescriptor],
    pattern: &DevicePattern,
) -> Option<&'a DeviceDescriptor> {
    devices
        .iter()
        .find(|d| pattern.matches_path(d))
        .or_else(|| devices.iter().find(|d| pattern.matches_ids(d)))
}

/// Enumerate and select the device matching `pattern`.
///
/// `Ok(None)` means nothing matched; that is an expected outcome, not an
/// error. Enumeration failures are returned as errors.
pub async fn find_device(
    discovery: &dyn DeviceDiscovery,
    pattern: &DevicePattern,
) -> Result<Option<DeviceDescriptor>, TransportError> {
    let devices = discovery.list_devices().await?;
    let found = select_device(&devices, pattern).cloned();
    match &found {
        Some(device) => debug!("Pattern {} matched {}", pattern, device.path),
        None => debug!(
            "Pattern {} matched none of {} devices",
            pattern,
            devices.len()
        ),
    }
    Ok(found)
}

/// HID discovery backed by a single hidapi context
///
/// Enumeration and open block in hidapi, so both run on tokio's blocking pool.
pub struct HidDiscovery {
    api: Arc<Mutex<HidApi>>,
    read_timeout: Duration,
}

impl HidDiscovery {
    /// Initialize hidapi. Fails when the platform HID subsystem is unavailable.
    pub fn new() -> Result<Self, TransportError> {
        let api = HidApi::new().map_err(|e| TransportError::Enumeration(e.to_string()))?;
        Ok(Self {
            api: Arc::new(Mutex::new(api)),
            read_timeout: Duration::from_millis(timing::DEFAULT_READ_TIMEOUT_MS),
        })
    }

    /// Set the read timeout used by sessions opened from here
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    async fn snapshot(&self) -> Result<Vec<DeviceDescriptor>, TransportError> {
        let api = self.api.clone();
        run_blocking(move || {
            let mut api = api.lock();
            api.refresh_devices()
                .map_err(|e| TransportError::Enumeration(e.to_string()))?;
            Ok(api.device_list().map(DeviceDescriptor::from).collect())
        })
        .await
    }

    async fn open(
        &self,
        device: &DeviceDescriptor,
    ) -> Result<hidapi::HidDevice, TransportError> {
        let path = device.hid_path()?.to_owned();
        let api = self.api.clone();
        run_blocking(move || Ok(api.lock().open_path(&path)?)).await
    }
}

#[async_trait]
impl DeviceDiscovery for HidDiscovery {
    async fn list_devices(&self) -> Result<Vec<DeviceDescriptor>, TransportError> {
        let devices = self.snapshot().await?;
        debug!("Enumerated {} HID devices", devices.len());
        Ok(devices)
    }

    async fn open_device(
        &self,
        device: &DeviceDescriptor,
    ) -> Result<BoxedSession, TransportError> {
        let hid = self.open(device).await?;
        info!(
            "Opened {:04X}:{:04X} at {}",
            device.vid, device.pid, device.path
        );
        Ok(Box::new(HidSession::new(
            hid,
            device.clone(),
            self.read_timeout,
        )))
    }
}
