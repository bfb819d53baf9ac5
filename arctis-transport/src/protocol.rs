//! Protocol constants and the status frame codec for Arctis base stations
//!
//! The base station answers a two-byte status request with an 8-byte input
//! report. Only two fields are used:
//!
//! ```text
//! offset  0    1    2         3
//!        [id] [..] [status]  [battery] [..] [..] [..] [..]
//! ```
//!
//! Both fields are read from the frame's textual hex rendering (space
//! separated, two uppercase digits per byte), so the same decoder works on
//! live frames and on dumps copied from the diagnostic view.

use std::fmt;

use thiserror::Error;

/// Report size of the status exchange (report ID included)
pub const REPORT_SIZE: usize = 8;

/// Status request: report ID 0x06, opcode 0x12
pub const STATUS_REQUEST: [u8; 2] = [0x06, 0x12];

/// Byte offset of the connection status code
pub const STATUS_OFFSET: usize = 2;

/// Byte offset of the raw battery level
pub const BATTERY_OFFSET: usize = 3;

/// Minimum number of bytes a frame needs to carry both fields
pub const MIN_FRAME_LEN: usize = BATTERY_OFFSET + 1;

/// Status code reported while the headset is linked to the base station
pub const STATUS_ONLINE: u8 = 0x03;

/// Battery values above this are a firmware quirk and are clamped
pub const BATTERY_MAX: u8 = 100;

/// Device identification
pub mod device {
    /// SteelSeries vendor ID
    pub const VENDOR_ID: u16 = 0x1038;
    /// Arctis wireless base station
    pub const PID_ARCTIS_BASE: u16 = 0x12B3;
    /// Interface and collection carrying the status report (Windows path form)
    pub const DEFAULT_PATTERN: &str = "vid_1038&pid_12b3&mi_03&col02";
}

/// Timing constants
pub mod timing {
    /// Interval between two status exchanges
    pub const POLL_CADENCE_MS: u64 = 1000;
    /// Default bound on the read half of an exchange
    pub const DEFAULT_READ_TIMEOUT_MS: u64 = 1000;
    /// Extra time granted to the blocking exchange task on top of the read timeout
    pub const EXCHANGE_GRACE_MS: u64 = 500;
}

/// Headset link state as reported by the base station
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceStatus {
    Offline,
    Online,
}

impl DeviceStatus {
    /// Map a raw status code. Only `0x03` means online; every other code
    /// (pairing, charging-only, off) is reported as offline.
    pub fn from_code(code: u8) -> Self {
        if code == STATUS_ONLINE {
            Self::Online
        } else {
            Self::Offline
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offline => "Offline",
            Self::Online => "Online",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded status report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRecord {
    pub status: DeviceStatus,
    /// Battery level, always within `0..=100`
    pub battery_percent: u8,
}

impl StatusRecord {
    /// Build a record from the two raw field values.
    pub fn from_raw(status_code: u8, battery_raw: u8) -> Self {
        Self {
            status: DeviceStatus::from_code(status_code),
            battery_percent: battery_raw.min(BATTERY_MAX),
        }
    }
}

/// Errors from decoding a status frame
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Truncated frame: got {len} bytes, need at least {}", MIN_FRAME_LEN)]
    Truncated { len: usize },

    #[error("Invalid hex token {token:?} at offset {offset}")]
    InvalidToken { offset: usize, token: String },
}

/// Build the status request frame.
pub fn encode_status_request() -> [u8; 2] {
    STATUS_REQUEST
}

/// Render bytes as space separated two-digit uppercase hex (`"06 12 03 32"`).
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode the first `length` bytes of `buffer`.
///
/// `length` is the count reported by the read; bytes past it are ignored even
/// if the buffer is larger.
pub fn decode(buffer: &[u8], length: usize) -> Result<StatusRecord, DecodeError> {
    let len = length.min(buffer.len());
    decode_hex(&hex_dump(&buffer[..len]))
}

/// Decode a textual hex dump as produced by [`hex_dump`].
pub fn decode_hex(dump: &str) -> Result<StatusRecord, DecodeError> {
    let tokens: Vec<&str> = dump.split_whitespace().collect();
    if tokens.len() < MIN_FRAME_LEN {
        return Err(DecodeError::Truncated { len: tokens.len() });
    }

    let status_code = parse_token(tokens[STATUS_OFFSET], STATUS_OFFSET)?;
    let battery_raw = parse_token(tokens[BATTERY_OFFSET], BATTERY_OFFSET)?;
    Ok(StatusRecord::from_raw(status_code, battery_raw))
}

fn parse_token(token: &str, offset: usize) -> Result<u8, DecodeError> {
    let invalid = || DecodeError::InvalidToken {
        offset,
        token: token.to_string(),
    };
    if token.len() != 2 || !token.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    u8::from_str_radix(token, 16).map_err(|_| invalid())
}
