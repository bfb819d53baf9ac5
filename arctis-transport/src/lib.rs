//! Transport layer for SteelSeries Arctis wireless base stations
//!
//! - Discovery: enumerate HID devices and select one by path pattern
//! - Session: write-then-read exchange with the selected interface
//! - Protocol: the status request and the response frame codec
//!
//! ```text
//! [HidDiscovery]  ← implements DeviceDiscovery (enumerate, open)
//!       |
//!  [HidSession]   ← implements Session (exchange, close)
//!       |
//!  [protocol]     ← encode_status_request / decode
//! ```

pub mod error;
pub mod pattern;
pub mod protocol;
pub mod session;
pub mod types;

mod discovery;
mod hid_session;

pub use discovery::{find_device, select_device, DeviceDiscovery, HidDiscovery};
pub use error::TransportError;
pub use hid_session::HidSession;
pub use pattern::{DevicePattern, UsbIds};
pub use protocol::{
    decode, decode_hex, encode_status_request, hex_dump, DecodeError, DeviceStatus,
    StatusRecord,
};
pub use session::{BoxedSession, Session};
pub use types::{DeviceDescriptor, StatusFrame, UNKNOWN_DEVICE_NAME};
