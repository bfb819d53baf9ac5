//! Textual readout of the monitored device
//!
//! The monitor hands every decoded reading and every connection change to a
//! [`Presenter`]. Presenting is best effort: errors are returned to the
//! monitor, which logs them and keeps polling.

use std::fmt;
use std::io::{self, Write};
use std::time::Duration;

use arctis_transport::{DeviceDescriptor, StatusFrame, StatusRecord};
use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};

/// Title line of every screen
pub const TITLE: &str = "============== ARCTIS BATTERY MONITOR =============";

/// Connection changes and recoverable failures reported by the monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Entered the disconnected state
    Searching { pattern: String },
    /// No attached device matched; another attempt follows
    NotFound { pattern: String, retry_in: Duration },
    /// The platform device list could not be read
    EnumerationFailed { error: String, retry_in: Duration },
    /// A device matched but could not be opened
    ConnectFailed {
        device: String,
        error: String,
        retry_in: Duration,
    },
    Connected { device: String },
    /// The session was closed after a failure
    ConnectionLost { device: String, reason: String },
    /// A frame was discarded; the session stays open
    DecodeFailed { error: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Searching { pattern } => {
                write!(f, "Searching for device matching {pattern}...")
            }
            Notice::NotFound { pattern, retry_in } => write!(
                f,
                "No device matching {pattern}, retrying in {}ms",
                retry_in.as_millis()
            ),
            Notice::EnumerationFailed { error, retry_in } => write!(
                f,
                "Could not list HID devices ({error}), retrying in {}ms",
                retry_in.as_millis()
            ),
            Notice::ConnectFailed {
                device,
                error,
                retry_in,
            } => write!(
                f,
                "Could not connect to {device} ({error}), retrying in {}ms",
                retry_in.as_millis()
            ),
            Notice::Connected { device } => write!(f, "Connected to {device}"),
            Notice::ConnectionLost { device, reason } => {
                write!(f, "Lost connection to {device}: {reason}")
            }
            Notice::DecodeFailed { error } => write!(f, "Discarded malformed frame: {error}"),
        }
    }
}

/// Sink for readings and notices
pub trait Presenter: Send {
    /// Show a freshly decoded reading
    fn render(
        &mut self,
        device: &DeviceDescriptor,
        frame: &StatusFrame,
        record: &StatusRecord,
    ) -> io::Result<()>;

    /// Show a connection change or recoverable failure
    fn notice(&mut self, notice: &Notice) -> io::Result<()>;
}

/// Format the readout block.
///
/// The diagnostic variant adds the raw buffer and the two hex tokens the
/// fields were decoded from.
pub fn format_reading(
    device_name: &str,
    frame: &StatusFrame,
    record: &StatusRecord,
    diagnostic: bool,
) -> String {
    let mut out = String::new();
    out.push_str(TITLE);
    out.push('\n');
    out.push_str(&format!("Device: {device_name}\n"));
    if diagnostic {
        use arctis_transport::protocol::{BATTERY_OFFSET, STATUS_OFFSET};
        let token = |offset| frame.token(offset).unwrap_or_else(|| "--".to_string());
        out.push_str(&format!("Buffer: {}\n", frame.hex_dump()));
        out.push_str(&format!("Status Hex: {}\n", token(STATUS_OFFSET)));
        out.push_str(&format!("Status: {}\n", record.status));
        out.push_str(&format!("Battery Hex: {}\n", token(BATTERY_OFFSET)));
    } else {
        out.push_str(&format!("Status: {}\n", record.status));
    }
    out.push_str(&format!("Battery: {}%\n", record.battery_percent));
    out
}

/// Full-screen-refresh presenter for a terminal
pub struct TerminalPresenter<W: Write + Send> {
    out: W,
    diagnostic: bool,
    clear: bool,
    /// Why the previous session ended; shown until the next connect
    last_loss: Option<String>,
}

impl TerminalPresenter<io::Stdout> {
    /// Presenter writing to stdout
    pub fn stdout(diagnostic: bool) -> Self {
        Self::new(io::stdout(), diagnostic)
    }
}

impl<W: Write + Send> TerminalPresenter<W> {
    pub fn new(out: W, diagnostic: bool) -> Self {
        Self {
            out,
            diagnostic,
            clear: true,
            last_loss: None,
        }
    }

    /// Disable screen clearing (plain line output, e.g. when piped)
    pub fn without_clear(mut self) -> Self {
        self.clear = false;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_screen(&mut self, text: &str) -> io::Result<()> {
        if self.clear {
            queue!(self.out, Clear(ClearType::All), MoveTo(0, 0))?;
        }
        self.out.write_all(text.as_bytes())?;
        self.out.flush()
    }
}

impl<W: Write + Send> Presenter for TerminalPresenter<W> {
    fn render(
        &mut self,
        device: &DeviceDescriptor,
        frame: &StatusFrame,
        record: &StatusRecord,
    ) -> io::Result<()> {
        let text = format_reading(device.friendly_name(), frame, record, self.diagnostic);
        self.write_screen(&text)
    }

    fn notice(&mut self, notice: &Notice) -> io::Result<()> {
        match notice {
            // Keep the last reading on screen
            Notice::DecodeFailed { .. } => {
                if self.diagnostic {
                    writeln!(self.out, "{notice}")?;
                    self.out.flush()?;
                }
                Ok(())
            }
            Notice::ConnectionLost { .. } => {
                let text = notice.to_string();
                self.write_screen(&format!("{TITLE}\n{text}\n"))?;
                self.last_loss = Some(text);
                Ok(())
            }
            Notice::Connected { .. } => {
                self.last_loss = None;
                self.write_screen(&format!("{TITLE}\n{notice}\n"))
            }
            _ => {
                let mut text = format!("{TITLE}\n{notice}\n");
                if let Some(loss) = &self.last_loss {
                    text.push_str(loss);
                    text.push('\n');
                }
                self.write_screen(&text)
            }
        }
    }
}
