//! Poll loop tests against scripted devices
//!
//! Run on a paused clock so backoff and cadence waits complete instantly.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arctis_monitor::{
    shutdown_channel, Monitor, MonitorError, MonitorSettings, Notice, Presenter, ShutdownTrigger,
};
use arctis_transport::{
    BoxedSession, DeviceDescriptor, DeviceDiscovery, DevicePattern, Session, StatusFrame,
    StatusRecord, TransportError,
};
use async_trait::async_trait;

const PATTERN: &str = "vid_1038&pid_12b3&mi_03&col02";
const ONLINE_50: [u8; 8] = [0x06, 0x12, 0x03, 0x32, 0, 0, 0, 0];
const TRUNCATED: [u8; 2] = [0x06, 0x12];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Open(u32),
    Exchange(u32, bool),
    Close(u32),
}

enum Reply {
    Frame(Vec<u8>),
    IoError,
}

enum Listing {
    Present,
    Absent,
    Fail,
}

#[derive(Default)]
struct Script {
    events: Vec<Event>,
    replies: VecDeque<Reply>,
    listings: VecDeque<Listing>,
    open_failures: u32,
    opened: u32,
}

#[derive(Clone, Default)]
struct ScriptedDiscovery {
    script: Arc<Mutex<Script>>,
}

impl ScriptedDiscovery {
    fn new() -> Self {
        Self::default()
    }

    fn replies(self, replies: impl IntoIterator<Item = Reply>) -> Self {
        self.script.lock().unwrap().replies.extend(replies);
        self
    }

    fn listings(self, listings: impl IntoIterator<Item = Listing>) -> Self {
        self.script.lock().unwrap().listings.extend(listings);
        self
    }

    fn open_failures(self, count: u32) -> Self {
        self.script.lock().unwrap().open_failures = count;
        self
    }

    fn events(&self) -> Vec<Event> {
        self.script.lock().unwrap().events.clone()
    }
}

fn headset() -> DeviceDescriptor {
    DeviceDescriptor::new(
        0x1038,
        0x12B3,
        r"\\?\hid#vid_1038&pid_12b3&mi_03&col02#7&2a1b&0&0001#{4d1e55b2}",
    )
    .with_interface(3)
    .with_product_name("Arctis 7")
}

#[async_trait]
impl DeviceDiscovery for ScriptedDiscovery {
    async fn list_devices(&self) -> Result<Vec<DeviceDescriptor>, TransportError> {
        let listing = self.script.lock().unwrap().listings.pop_front();
        match listing.unwrap_or(Listing::Present) {
            Listing::Present => Ok(vec![
                DeviceDescriptor::new(0x046D, 0xC52B, r"\\?\hid#vid_046d&pid_c52b&mi_00#a"),
                headset(),
            ]),
            Listing::Absent => Ok(vec![]),
            Listing::Fail => Err(TransportError::Enumeration("hid subsystem busy".into())),
        }
    }

    async fn open_device(
        &self,
        device: &DeviceDescriptor,
    ) -> Result<BoxedSession, TransportError> {
        let mut script = self.script.lock().unwrap();
        if script.open_failures > 0 {
            script.open_failures -= 1;
            return Err(TransportError::HidError("device busy".into()));
        }
        script.opened += 1;
        let id = script.opened;
        script.events.push(Event::Open(id));
        Ok(Box::new(MockSession {
            id,
            device: device.clone(),
            script: self.script.clone(),
            open: true,
        }))
    }
}

struct MockSession {
    id: u32,
    device: DeviceDescriptor,
    script: Arc<Mutex<Script>>,
    open: bool,
}

#[async_trait]
impl Session for MockSession {
    fn descriptor(&self) -> &DeviceDescriptor {
        &self.device
    }

    async fn exchange(&mut self, request: &[u8]) -> Result<StatusFrame, TransportError> {
        assert_eq!(&request[..2], &[0x06, 0x12]);
        assert!(self.open, "exchange on closed session {}", self.id);
        let mut script = self.script.lock().unwrap();
        let reply = script
            .replies
            .pop_front()
            .unwrap_or_else(|| Reply::Frame(ONLINE_50.to_vec()));
        match reply {
            Reply::Frame(bytes) => {
                script.events.push(Event::Exchange(self.id, true));
                Ok(StatusFrame::from_bytes(&bytes))
            }
            Reply::IoError => {
                script.events.push(Event::Exchange(self.id, false));
                Err(TransportError::Disconnected)
            }
        }
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.script.lock().unwrap().events.push(Event::Close(self.id));
        }
    }
}

/// Records what it is shown and fires shutdown after a number of readings
struct RecordingPresenter {
    batteries: Vec<u8>,
    notices: Vec<Notice>,
    stop_after: usize,
    trigger: ShutdownTrigger,
    fail_render: bool,
}

impl RecordingPresenter {
    fn new(trigger: ShutdownTrigger, stop_after: usize) -> Self {
        Self {
            batteries: Vec::new(),
            notices: Vec::new(),
            stop_after,
            trigger,
            fail_render: false,
        }
    }

    fn failing(mut self) -> Self {
        self.fail_render = true;
        self
    }
}

impl Presenter for RecordingPresenter {
    fn render(
        &mut self,
        _device: &DeviceDescriptor,
        _frame: &StatusFrame,
        record: &StatusRecord,
    ) -> io::Result<()> {
        self.batteries.push(record.battery_percent);
        if self.batteries.len() >= self.stop_after {
            self.trigger.trigger();
        }
        if self.fail_render {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdout closed"));
        }
        Ok(())
    }

    fn notice(&mut self, notice: &Notice) -> io::Result<()> {
        self.notices.push(notice.clone());
        Ok(())
    }
}

fn pattern() -> DevicePattern {
    DevicePattern::new(PATTERN).unwrap()
}

fn ok() -> Reply {
    Reply::Frame(ONLINE_50.to_vec())
}

fn truncated() -> Reply {
    Reply::Frame(TRUNCATED.to_vec())
}

#[tokio::test(start_paused = true)]
async fn test_polls_until_shutdown_and_closes_session() {
    let discovery = ScriptedDiscovery::new();
    let (trigger, shutdown) = shutdown_channel();
    let presenter = RecordingPresenter::new(trigger, 3);
    let mut monitor = Monitor::new(
        discovery.clone(),
        presenter,
        pattern(),
        MonitorSettings::default(),
    );

    let start = tokio::time::Instant::now();
    let stats = monitor.run(shutdown).await.unwrap();

    assert_eq!(stats.records, 3);
    assert_eq!(stats.connects, 1);
    assert_eq!(monitor.presenter().batteries, vec![50, 50, 50]);
    assert!(start.elapsed() >= Duration::from_secs(2));
    assert_eq!(
        discovery.events(),
        vec![
            Event::Open(1),
            Event::Exchange(1, true),
            Event::Exchange(1, true),
            Event::Exchange(1, true),
            Event::Close(1),
        ]
    );
    assert!(!monitor.state().is_connected());
    assert!(matches!(
        monitor.presenter().notices.as_slice(),
        [Notice::Searching { .. }, Notice::Connected { device }] if device == "Arctis 7"
    ));
}

#[tokio::test(start_paused = true)]
async fn test_io_error_closes_before_reopening() {
    let discovery = ScriptedDiscovery::new().replies([ok(), Reply::IoError, ok()]);
    let (trigger, shutdown) = shutdown_channel();
    let mut monitor = Monitor::new(
        discovery.clone(),
        RecordingPresenter::new(trigger, 2),
        pattern(),
        MonitorSettings::default(),
    );

    let stats = monitor.run(shutdown).await.unwrap();

    assert_eq!(stats.io_errors, 1);
    assert_eq!(
        discovery.events(),
        vec![
            Event::Open(1),
            Event::Exchange(1, true),
            Event::Exchange(1, false),
            Event::Close(1),
            Event::Open(2),
            Event::Exchange(2, true),
            Event::Close(2),
        ]
    );
    assert!(monitor
        .presenter()
        .notices
        .iter()
        .any(|n| matches!(n, Notice::ConnectionLost { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_alternating_failures_reconnect_every_other_cycle() {
    let replies = (0..19).map(|i| if i % 2 == 0 { ok() } else { Reply::IoError });
    let discovery = ScriptedDiscovery::new().replies(replies);
    let (trigger, shutdown) = shutdown_channel();
    let mut monitor = Monitor::new(
        discovery.clone(),
        RecordingPresenter::new(trigger, 10),
        pattern(),
        MonitorSettings::default(),
    );

    let stats = monitor.run(shutdown).await.unwrap();

    assert_eq!(stats.records, 10);
    assert_eq!(stats.connects, 10);
    assert_eq!(stats.io_errors, 9);

    // No session is used after it was closed
    let events = discovery.events();
    for (i, event) in events.iter().enumerate() {
        if let Event::Close(id) = event {
            assert!(!events[i + 1..]
                .iter()
                .any(|e| matches!(e, Event::Exchange(other, _) if other == id)));
        }
    }
    let closes = events.iter().filter(|e| matches!(e, Event::Close(_))).count();
    assert_eq!(closes, 10);
}

#[tokio::test(start_paused = true)]
async fn test_missing_device_at_startup_is_fatal() {
    let discovery = ScriptedDiscovery::new().listings([Listing::Absent]);
    let (trigger, shutdown) = shutdown_channel();
    let mut monitor = Monitor::new(
        discovery.clone(),
        RecordingPresenter::new(trigger, 1),
        pattern(),
        MonitorSettings::default(),
    );

    let err = monitor.run(shutdown).await.unwrap_err();
    assert!(matches!(err, MonitorError::DeviceNotFound(p) if p == PATTERN));
    assert!(discovery.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_device_retries_with_backoff() {
    let discovery =
        ScriptedDiscovery::new().listings([Listing::Absent, Listing::Absent, Listing::Present]);
    let (trigger, shutdown) = shutdown_channel();
    let settings = MonitorSettings {
        wait_for_device: true,
        ..MonitorSettings::default()
    };
    let mut monitor = Monitor::new(
        discovery.clone(),
        RecordingPresenter::new(trigger, 1),
        pattern(),
        settings,
    );

    let start = tokio::time::Instant::now();
    let stats = monitor.run(shutdown).await.unwrap();

    assert_eq!(stats.connects, 1);
    assert_eq!(stats.records, 1);
    assert!(start.elapsed() >= Duration::from_millis(750));
    let retries: Vec<u128> = monitor
        .presenter()
        .notices
        .iter()
        .filter_map(|n| match n {
            Notice::NotFound { retry_in, .. } => Some(retry_in.as_millis()),
            _ => None,
        })
        .collect();
    assert_eq!(retries, vec![250, 500]);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frame_skips_cycle() {
    let discovery = ScriptedDiscovery::new().replies([ok(), truncated(), ok()]);
    let (trigger, shutdown) = shutdown_channel();
    let mut monitor = Monitor::new(
        discovery.clone(),
        RecordingPresenter::new(trigger, 2),
        pattern(),
        MonitorSettings::default(),
    );

    let stats = monitor.run(shutdown).await.unwrap();

    assert_eq!(stats.connects, 1);
    assert_eq!(stats.decode_errors, 1);
    assert_eq!(stats.records, 2);
    assert_eq!(
        discovery.events(),
        vec![
            Event::Open(1),
            Event::Exchange(1, true),
            Event::Exchange(1, true),
            Event::Exchange(1, true),
            Event::Close(1),
        ]
    );
    assert!(monitor
        .presenter()
        .notices
        .iter()
        .any(|n| matches!(n, Notice::DecodeFailed { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_repeated_malformed_frames_reopen_session() {
    let discovery = ScriptedDiscovery::new().replies([truncated(), truncated(), ok()]);
    let (trigger, shutdown) = shutdown_channel();
    let settings = MonitorSettings {
        max_decode_failures: 2,
        ..MonitorSettings::default()
    };
    let mut monitor = Monitor::new(
        discovery.clone(),
        RecordingPresenter::new(trigger, 1),
        pattern(),
        settings,
    );

    let stats = monitor.run(shutdown).await.unwrap();

    assert_eq!(stats.connects, 2);
    assert_eq!(stats.decode_errors, 2);
    assert_eq!(stats.io_errors, 0);
    assert_eq!(
        discovery.events(),
        vec![
            Event::Open(1),
            Event::Exchange(1, true),
            Event::Exchange(1, true),
            Event::Close(1),
            Event::Open(2),
            Event::Exchange(2, true),
            Event::Close(2),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_open_failures_are_retried() {
    let discovery = ScriptedDiscovery::new().open_failures(2);
    let (trigger, shutdown) = shutdown_channel();
    let mut monitor = Monitor::new(
        discovery.clone(),
        RecordingPresenter::new(trigger, 1),
        pattern(),
        MonitorSettings::default(),
    );

    let stats = monitor.run(shutdown).await.unwrap();

    assert_eq!(stats.connects, 1);
    let retries: Vec<u128> = monitor
        .presenter()
        .notices
        .iter()
        .filter_map(|n| match n {
            Notice::ConnectFailed { retry_in, .. } => Some(retry_in.as_millis()),
            _ => None,
        })
        .collect();
    assert_eq!(retries, vec![250, 500]);
}

#[tokio::test(start_paused = true)]
async fn test_render_failure_keeps_polling() {
    let discovery = ScriptedDiscovery::new();
    let (trigger, shutdown) = shutdown_channel();
    let mut monitor = Monitor::new(
        discovery.clone(),
        RecordingPresenter::new(trigger, 3).failing(),
        pattern(),
        MonitorSettings::default(),
    );

    let stats = monitor.run(shutdown).await.unwrap();

    assert_eq!(stats.records, 3);
    assert_eq!(stats.connects, 1);
}

#[tokio::test(start_paused = true)]
async fn test_enumeration_failure_at_startup_is_fatal() {
    let discovery = ScriptedDiscovery::new().listings([Listing::Fail]);
    let (trigger, shutdown) = shutdown_channel();
    let mut monitor = Monitor::new(
        discovery,
        RecordingPresenter::new(trigger, 1),
        pattern(),
        MonitorSettings::default(),
    );

    let err = monitor.run(shutdown).await.unwrap_err();
    assert!(matches!(err, MonitorError::Enumeration(_)));
}

#[tokio::test(start_paused = true)]
async fn test_enumeration_failure_after_connect_is_retried() {
    let discovery = ScriptedDiscovery::new()
        .listings([Listing::Present, Listing::Fail, Listing::Present])
        .replies([Reply::IoError, ok()]);
    let (trigger, shutdown) = shutdown_channel();
    let mut monitor = Monitor::new(
        discovery.clone(),
        RecordingPresenter::new(trigger, 1),
        pattern(),
        MonitorSettings::default(),
    );

    let stats = monitor.run(shutdown).await.unwrap();

    assert_eq!(stats.connects, 2);
    assert!(monitor
        .presenter()
        .notices
        .iter()
        .any(|n| matches!(n, Notice::EnumerationFailed { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_before_start() {
    let discovery = ScriptedDiscovery::new();
    let (trigger, shutdown) = shutdown_channel();
    trigger.trigger();
    let mut monitor = Monitor::new(
        discovery.clone(),
        RecordingPresenter::new(trigger, 1),
        pattern(),
        MonitorSettings::default(),
    );

    let stats = monitor.run(shutdown).await.unwrap();

    assert_eq!(stats.records, 0);
    assert!(discovery.events().is_empty());
}
