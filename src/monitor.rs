//! Poll loop for the headset base station
//!
//! ```text
//!            discovery + open ok
//!   Disconnected ──────────────────▶ Connected ──┐ exchange + decode ok:
//!     ▲    │ not found / open failed     │  ▲     │ render, wait one cadence
//!     │    └── wait backoff, retry       │  └─────┘
//!     └──────────────────────────────────┘
//!       I/O error, timeout, or too many malformed frames: close session
//! ```
//!
//! A single malformed frame only skips the cycle. Cancellation is checked
//! every cycle and raced against every wait and exchange; the live session is
//! closed before [`Monitor::run`] returns.

use std::time::Duration;

use arctis_transport::protocol::timing;
use arctis_transport::{
    encode_status_request, find_device, BoxedSession, DeviceDiscovery, DevicePattern,
    TransportError,
};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::presenter::{Notice, Presenter};

/// Errors that end the monitor
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Could not find a device matching {0}")]
    DeviceNotFound(String),

    #[error("Could not list HID devices: {0}")]
    Enumeration(#[source] TransportError),
}

/// Timing and tolerance of the poll loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Wait between two exchanges
    pub cadence: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Consecutive malformed frames before the session is reopened
    pub max_decode_failures: u32,
    /// Retry instead of failing when the device is absent at startup
    pub wait_for_device: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self::from(&MonitorConfig::default())
    }
}

impl From<&MonitorConfig> for MonitorSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            cadence: Duration::from_millis(timing::POLL_CADENCE_MS),
            initial_backoff: Duration::from_millis(config.reconnect.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.reconnect.max_backoff_ms),
            max_decode_failures: config.session.max_decode_failures,
            wait_for_device: config.device.wait_for_device,
        }
    }
}

/// Exponential retry delay, doubled per failure up to a cap
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial.min(max),
        }
    }

    /// Delay to wait now; the following call returns a longer one
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial.min(self.max);
    }
}

/// Sending half of the cancellation signal
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Receiving half of the cancellation signal
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the trigger fires. Never resolves if the trigger is
    /// dropped without firing.
    pub async fn triggered(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Create a linked trigger/receiver pair
pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

/// Connection state of the loop
pub enum MonitorState {
    Disconnected,
    Connected(BoxedSession),
}

impl MonitorState {
    pub fn is_connected(&self) -> bool {
        matches!(self, MonitorState::Connected(_))
    }
}

/// Counters reported when the loop ends
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MonitorStats {
    /// Sessions successfully opened
    pub connects: u32,
    /// Readings handed to the presenter
    pub records: u64,
    /// Exchanges that failed and closed their session
    pub io_errors: u32,
    /// Frames discarded as malformed
    pub decode_errors: u32,
}

/// The poll loop
pub struct Monitor<D: DeviceDiscovery, P: Presenter> {
    discovery: D,
    presenter: P,
    pattern: DevicePattern,
    settings: MonitorSettings,
    backoff: Backoff,
    state: MonitorState,
    decode_failures: u32,
    stats: MonitorStats,
}

impl<D: DeviceDiscovery, P: Presenter> Monitor<D, P> {
    pub fn new(
        discovery: D,
        presenter: P,
        pattern: DevicePattern,
        settings: MonitorSettings,
    ) -> Self {
        let backoff = Backoff::new(settings.initial_backoff, settings.max_backoff);
        Self {
            discovery,
            presenter,
            pattern,
            settings,
            backoff,
            state: MonitorState::Disconnected,
            decode_failures: 0,
            stats: MonitorStats::default(),
        }
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    pub fn stats(&self) -> MonitorStats {
        self.stats
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Run until `shutdown` fires.
    ///
    /// Returns an error only when the very first discovery finds no device
    /// (unless `wait_for_device` is set) or cannot enumerate at all.
    pub async fn run(&mut self, mut shutdown: Shutdown) -> Result<MonitorStats, MonitorError> {
        info!("Monitoring device matching {}", self.pattern);
        self.notify(Notice::Searching {
            pattern: self.pattern.to_string(),
        });

        let mut first_attempt = true;
        let result = loop {
            if shutdown.is_triggered() {
                break Ok(());
            }

            let wait = if self.state.is_connected() {
                tokio::select! {
                    wait = self.poll_cycle() => wait,
                    _ = shutdown.triggered() => break Ok(()),
                }
            } else {
                let attempt = tokio::select! {
                    attempt = self.try_connect(first_attempt) => attempt,
                    _ = shutdown.triggered() => break Ok(()),
                };
                first_attempt = false;
                match attempt {
                    Ok(wait) => wait,
                    Err(e) => break Err(e),
                }
            };

            if wait.is_zero() {
                continue;
            }
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.triggered() => break Ok(()),
            }
        };

        if let MonitorState::Connected(mut session) =
            std::mem::replace(&mut self.state, MonitorState::Disconnected)
        {
            session.close();
        }

        info!(
            "Monitor stopped: {} connects, {} readings, {} I/O errors, {} malformed frames",
            self.stats.connects,
            self.stats.records,
            self.stats.io_errors,
            self.stats.decode_errors
        );
        result.map(|_| self.stats)
    }

    /// One discovery + open attempt. Returns how long to wait before the
    /// next step.
    async fn try_connect(&mut self, first_attempt: bool) -> Result<Duration, MonitorError> {
        let device = match find_device(&self.discovery, &self.pattern).await {
            Ok(Some(device)) => device,
            Ok(None) => {
                if first_attempt && !self.settings.wait_for_device {
                    return Err(MonitorError::DeviceNotFound(self.pattern.to_string()));
                }
                let retry_in = self.backoff.next_delay();
                debug!(
                    "No device matching {}, retrying in {:?}",
                    self.pattern, retry_in
                );
                self.notify(Notice::NotFound {
                    pattern: self.pattern.to_string(),
                    retry_in,
                });
                return Ok(retry_in);
            }
            Err(e) => {
                if first_attempt {
                    return Err(MonitorError::Enumeration(e));
                }
                let retry_in = self.backoff.next_delay();
                warn!(
                    "Device enumeration failed: {}, retrying in {:?}",
                    e, retry_in
                );
                self.notify(Notice::EnumerationFailed {
                    error: e.to_string(),
                    retry_in,
                });
                return Ok(retry_in);
            }
        };

        match self.discovery.open_device(&device).await {
            Ok(session) => {
                info!("Connected to {}", device);
                self.backoff.reset();
                self.decode_failures = 0;
                self.stats.connects += 1;
                self.state = MonitorState::Connected(session);
                self.notify(Notice::Connected {
                    device: device.friendly_name().to_string(),
                });
                Ok(Duration::ZERO)
            }
            Err(e) => {
                let retry_in = self.backoff.next_delay();
                if e.is_permission_denied() {
                    warn!(
                        "Access to {} denied: {} (check device permissions)",
                        device.path, e
                    );
                } else {
                    warn!("Failed to open {}: {}", device.path, e);
                }
                self.notify(Notice::ConnectFailed {
                    device: device.friendly_name().to_string(),
                    error: e.to_string(),
                    retry_in,
                });
                Ok(retry_in)
            }
        }
    }

    /// One request/response cycle on the live session. Returns how long to
    /// wait before the next step.
    async fn poll_cycle(&mut self) -> Duration {
        let MonitorState::Connected(session) = &mut self.state else {
            return Duration::ZERO;
        };

        let request = encode_status_request();
        let frame = match session.exchange(&request).await {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Exchange with {} failed: {}", session.descriptor(), e);
                self.stats.io_errors += 1;
                return self.drop_session(e.to_string());
            }
        };

        match frame.decode() {
            Ok(record) => {
                debug!("Frame [{}] -> {:?}", frame.hex_dump(), record);
                self.decode_failures = 0;
                self.stats.records += 1;
                if let Err(e) = self
                    .presenter
                    .render(session.descriptor(), &frame, &record)
                {
                    warn!("Failed to render reading: {}", e);
                }
            }
            Err(e) => {
                self.decode_failures += 1;
                self.stats.decode_errors += 1;
                warn!("Discarding malformed frame [{}]: {}", frame.hex_dump(), e);
                self.notify(Notice::DecodeFailed {
                    error: e.to_string(),
                });
                if self.decode_failures >= self.settings.max_decode_failures {
                    let reason =
                        format!("{} consecutive malformed frames", self.decode_failures);
                    return self.drop_session(reason);
                }
            }
        }

        self.settings.cadence
    }

    /// Close the live session and fall back to discovery. Returns the delay
    /// before the next discovery attempt.
    fn drop_session(&mut self, reason: String) -> Duration {
        self.decode_failures = 0;
        if let MonitorState::Connected(mut session) =
            std::mem::replace(&mut self.state, MonitorState::Disconnected)
        {
            session.close();
            let device = session.descriptor().friendly_name().to_string();
            info!("Closed session to {}: {}", device, reason);
            self.notify(Notice::ConnectionLost { device, reason });
            self.notify(Notice::Searching {
                pattern: self.pattern.to_string(),
            });
        }
        self.backoff.next_delay()
    }

    fn notify(&mut self, notice: Notice) {
        if let Err(e) = self.presenter.notice(&notice) {
            warn!("Failed to show notice: {}", e);
        }
    }
}
