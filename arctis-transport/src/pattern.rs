//! Device path patterns
//!
//! A pattern is the identifier string found inside the Windows HID device
//! path, e.g. `vid_1038&pid_12b3&mi_03&col02`. Matching is a case-insensitive
//! substring test against the enumerated path. On platforms whose paths do not
//! embed these identifiers (`/dev/hidraw3`, `IOService:/...`), a pattern that
//! parses into USB ids also matches on the reported vid/pid/interface.

use std::fmt;
use std::str::FromStr;

use crate::error::TransportError;
use crate::types::DeviceDescriptor;

/// USB identifiers extracted from a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbIds {
    pub vid: u16,
    pub pid: u16,
    /// `mi_NN`
    pub interface: Option<i32>,
    /// `colNN`; not observable through hidapi, so never matched on
    pub collection: Option<u8>,
}

impl fmt::Display for UsbIds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VID={:04x} PID={:04x}", self.vid, self.pid)?;
        if let Some(mi) = self.interface {
            write!(f, " if={mi}")?;
        }
        if let Some(col) = self.collection {
            write!(f, " col={col:02} (not matched on ids)")?;
        }
        Ok(())
    }
}

impl UsbIds {
    fn parse(pattern: &str) -> Option<Self> {
        let mut vid = None;
        let mut pid = None;
        let mut interface = None;
        let mut collection = None;

        for part in pattern.split('&') {
            if let Some(hex) = part.strip_prefix("vid_") {
                vid = Some(u16::from_str_radix(hex, 16).ok()?);
            } else if let Some(hex) = part.strip_prefix("pid_") {
                pid = Some(u16::from_str_radix(hex, 16).ok()?);
            } else if let Some(hex) = part.strip_prefix("mi_") {
                interface = Some(i32::from_str_radix(hex, 16).ok()?);
            } else if let Some(hex) = part.strip_prefix("col") {
                collection = Some(u8::from_str_radix(hex, 16).ok()?);
            } else {
                return None;
            }
        }

        Some(Self {
            vid: vid?,
            pid: pid?,
            interface,
            collection,
        })
    }

    fn matches(&self, device: &DeviceDescriptor) -> bool {
        device.vid == self.vid
            && device.pid == self.pid
            && self
                .interface
                .map_or(true, |mi| device.interface_number == mi)
    }
}

/// Substring pattern identifying the target HID interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevicePattern {
    raw: String,
    lowered: String,
    ids: Option<UsbIds>,
}

impl DevicePattern {
    pub fn new(pattern: &str) -> Result<Self, TransportError> {
        let raw = pattern.trim();
        if raw.is_empty() {
            return Err(TransportError::InvalidPattern(
                "pattern must not be empty".into(),
            ));
        }
        let lowered = raw.to_ascii_lowercase();
        let ids = UsbIds::parse(&lowered);
        Ok(Self {
            raw: raw.to_string(),
            lowered,
            ids,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// USB ids, when the pattern has the `vid_XXXX&pid_YYYY...` form
    pub fn ids(&self) -> Option<&UsbIds> {
        self.ids.as_ref()
    }

    /// Case-insensitive substring match on the device path
    pub fn matches_path(&self, device: &DeviceDescriptor) -> bool {
        device.path.to_ascii_lowercase().contains(&self.lowered)
    }

    /// Match on reported ids, for devices whose path carries no ids.
    ///
    /// Windows paths always embed `vid_`, so a sibling collection of the
    /// same interface cannot be picked up here.
    pub fn matches_ids(&self, device: &DeviceDescriptor) -> bool {
        match &self.ids {
            Some(ids) => !path_encodes_ids(&device.path) && ids.matches(device),
            None => false,
        }
    }

    pub fn matches(&self, device: &DeviceDescriptor) -> bool {
        self.matches_path(device) || self.matches_ids(device)
    }
}

fn path_encodes_ids(path: &str) -> bool {
    path.to_ascii_lowercase().contains("vid_")
}

impl FromStr for DevicePattern {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for DevicePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
