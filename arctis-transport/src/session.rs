//! Device session abstraction

use async_trait::async_trait;

use crate::error::TransportError;
use crate::types::{DeviceDescriptor, StatusFrame};

/// An open duplex channel to one device
///
/// A session is owned by exactly one caller. After any I/O error it must be
/// closed and reopened through discovery; it is never reused.
#[async_trait]
pub trait Session: Send {
    /// The device this session was opened for
    fn descriptor(&self) -> &DeviceDescriptor;

    /// Write `request` in full, then perform one bounded read
    ///
    /// # Returns
    /// The populated part of the response. A read that produces no data
    /// within the timeout is reported as [`TransportError::Timeout`].
    async fn exchange(&mut self, request: &[u8]) -> Result<StatusFrame, TransportError>;

    /// Release the underlying handle. Safe to call more than once.
    fn close(&mut self);
}

/// Type alias for a boxed session
pub type BoxedSession = Box<dyn Session>;
