//! Transport error types

use thiserror::Error;

/// Errors that can occur while discovering, opening or talking to a device
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Device disconnected")]
    Disconnected,

    #[error("Communication timeout")]
    Timeout,

    #[error("Short write: sent {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    #[error("Invalid device pattern: {0}")]
    InvalidPattern(String),

    #[error("HID enumeration failed: {0}")]
    Enumeration(String),

    // HID-specific errors
    #[error("HID error: {0}")]
    HidError(String),

    #[error("HID permission denied: {0}")]
    HidPermissionDenied(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TransportError {
    /// Whether the OS refused access to the device node
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::HidPermissionDenied(_))
    }
}

impl From<hidapi::HidError> for TransportError {
    fn from(e: hidapi::HidError) -> Self {
        let msg = e.to_string();
        if msg.contains("Permission denied")
            || msg.contains("EPERM")
            || msg.contains("Access is denied")
        {
            TransportError::HidPermissionDenied(msg)
        } else {
            TransportError::HidError(msg)
        }
    }
}
