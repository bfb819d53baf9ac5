//! Common types for the transport layer

use std::ffi::{CStr, CString};
use std::fmt;

use crate::error::TransportError;
use crate::protocol::{self, REPORT_SIZE};

/// Name shown for devices that report no product string
pub const UNKNOWN_DEVICE_NAME: &str = "Unknown";

/// One attached HID interface, as seen at enumeration time
///
/// A descriptor is a snapshot: the device may be gone by the time it is
/// opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// USB Vendor ID
    pub vid: u16,
    /// USB Product ID
    pub pid: u16,
    /// USB interface number (-1 when the platform does not report one)
    pub interface_number: i32,
    /// HID usage page of the top-level collection
    pub usage_page: u16,
    /// HID usage of the top-level collection
    pub usage: u16,
    /// Platform device path rendered as text
    pub path: String,
    /// Platform device path as handed out by hidapi, used to reopen.
    /// Empty when the text path cannot be represented (interior NUL).
    pub raw_path: CString,
    /// Product name if available
    pub product_name: Option<String>,
}

impl DeviceDescriptor {
    /// Descriptor for a device known only by its path.
    ///
    /// A path with an interior NUL byte gets an empty `raw_path`; such a
    /// descriptor can be listed and matched but [`hid_path`](Self::hid_path)
    /// refuses it.
    pub fn new(vid: u16, pid: u16, path: impl Into<String>) -> Self {
        let path = path.into();
        let raw_path = CString::new(path.clone()).unwrap_or_default();
        Self {
            vid,
            pid,
            interface_number: -1,
            usage_page: 0,
            usage: 0,
            path,
            raw_path,
            product_name: None,
        }
    }

    pub fn with_interface(mut self, interface_number: i32) -> Self {
        self.interface_number = interface_number;
        self
    }

    pub fn with_product_name(mut self, name: impl Into<String>) -> Self {
        self.product_name = Some(name.into());
        self
    }

    /// Path to hand to hidapi when opening the device
    pub fn hid_path(&self) -> Result<&CStr, TransportError> {
        if self.raw_path.as_bytes().is_empty() {
            return Err(TransportError::HidError(format!(
                "device path {:?} cannot be opened",
                self.path
            )));
        }
        Ok(&self.raw_path)
    }

    /// Human-readable name for display
    pub fn friendly_name(&self) -> &str {
        self.product_name.as_deref().unwrap_or(UNKNOWN_DEVICE_NAME)
    }
}

impl From<&hidapi::DeviceInfo> for DeviceDescriptor {
    fn from(info: &hidapi::DeviceInfo) -> Self {
        Self {
            vid: info.vendor_id(),
            pid: info.product_id(),
            interface_number: info.interface_number(),
            usage_page: info.usage_page(),
            usage: info.usage(),
            path: info.path().to_string_lossy().to_string(),
            raw_path: info.path().to_owned(),
            product_name: info
                .product_string()
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string()),
        }
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:04X}:{:04X} if={})",
            self.friendly_name(),
            self.vid,
            self.pid,
            self.interface_number
        )
    }
}

/// Raw response of one exchange
///
/// Only the first `len` bytes were populated by the read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusFrame {
    data: [u8; REPORT_SIZE],
    len: usize,
}

impl StatusFrame {
    pub fn new(data: [u8; REPORT_SIZE], len: usize) -> Self {
        Self {
            data,
            len: len.min(REPORT_SIZE),
        }
    }

    /// Copy up to `REPORT_SIZE` bytes into a frame.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let len = bytes.len().min(REPORT_SIZE);
        let mut data = [0u8; REPORT_SIZE];
        data[..len].copy_from_slice(&bytes[..len]);
        Self { data, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The populated part of the frame
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Space separated hex rendering of the populated bytes
    pub fn hex_dump(&self) -> String {
        protocol::hex_dump(self.as_bytes())
    }

    /// Two-digit hex token of the byte at `offset`, if it was populated
    pub fn token(&self, offset: usize) -> Option<String> {
        self.as_bytes().get(offset).map(|b| format!("{b:02X}"))
    }

    pub fn decode(&self) -> Result<protocol::StatusRecord, protocol::DecodeError> {
        protocol::decode(&self.data, self.len)
    }
}
