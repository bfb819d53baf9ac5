//! HID session over hidapi

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hidapi::HidDevice;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::TransportError;
use crate::protocol::{timing, REPORT_SIZE};
use crate::session::Session;
use crate::types::{DeviceDescriptor, StatusFrame};

/// Session backed by an open `HidDevice`
///
/// hidapi calls block, so each exchange runs on tokio's blocking pool. The
/// device sits behind an `Arc` so an exchange abandoned on timeout can still
/// finish on the pool; the handle is released once both sides let go.
pub struct HidSession {
    device: Option<Arc<Mutex<HidDevice>>>,
    info: DeviceDescriptor,
    read_timeout: Duration,
}

impl HidSession {
    pub fn new(device: HidDevice, info: DeviceDescriptor, read_timeout: Duration) -> Self {
        Self {
            device: Some(Arc::new(Mutex::new(device))),
            info,
            read_timeout,
        }
    }
}

/// Run blocking hidapi work on tokio's blocking pool
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, TransportError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, TransportError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| TransportError::Internal(format!("blocking task failed: {e}")))?
}

/// Report-level I/O of an open device
pub(crate) trait ReportIo {
    fn write_report(&self, data: &[u8]) -> Result<usize, TransportError>;
    fn read_report(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize, TransportError>;
}

impl ReportIo for HidDevice {
    fn write_report(&self, data: &[u8]) -> Result<usize, TransportError> {
        Ok(self.write(data)?)
    }

    fn read_report(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize, TransportError> {
        Ok(self.read_timeout(buf, timeout_ms)?)
    }
}

/// Blocking write-then-read on the device
fn write_then_read<D: ReportIo + ?Sized>(
    device: &D,
    request: &[u8],
    timeout_ms: i32,
) -> Result<StatusFrame, TransportError> {
    let written = device.write_report(request)?;
    if written < request.len() {
        return Err(TransportError::ShortWrite {
            written,
            expected: request.len(),
        });
    }

    let mut buf = [0u8; REPORT_SIZE];
    let len = device.read_report(&mut buf, timeout_ms)?;
    if len == 0 {
        return Err(TransportError::Timeout);
    }
    Ok(StatusFrame::new(buf, len))
}

#[async_trait]
impl Session for HidSession {
    fn descriptor(&self) -> &DeviceDescriptor {
        &self.info
    }

    async fn exchange(&mut self, request: &[u8]) -> Result<StatusFrame, TransportError> {
        let device = self.device.clone().ok_or(TransportError::Disconnected)?;
        let request = request.to_vec();
        let timeout_ms = i32::try_from(self.read_timeout.as_millis()).unwrap_or(i32::MAX);

        debug!("Exchange {:02X?} with {}", request, self.info.path);
        let task = run_blocking(move || {
            let device = device.lock();
            write_then_read(&*device, &request, timeout_ms)
        });

        let bound = self.read_timeout + Duration::from_millis(timing::EXCHANGE_GRACE_MS);
        tokio::time::timeout(bound, task)
            .await
            .unwrap_or(Err(TransportError::Timeout))
    }

    fn close(&mut self) {
        if self.device.take().is_some() {
            debug!("Closed HID session for {}", self.info.path);
        }
    }
}

impl Drop for HidSession {
    fn drop(&mut self) {
        self.close();
    }
}
