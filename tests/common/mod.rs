#![allow(dead_code)]

use scanrelay::hal::Clock;
use scanrelay::uplink::Uplink;
use scanrelay::watchdog::Watchdog;
use scanrelay::UplinkError;
use std::cell::Cell;
use std::rc::Rc;

/// Clock advanced by hand from the test.
#[derive(Clone, Default)]
pub struct ManualClock(Rc<Cell<u64>>);

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, now_ms: u64) {
        self.0.set(now_ms);
    }

    pub fn advance(&self, ms: u64) {
        self.0.set(self.0.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.get()
    }
}

#[derive(Default)]
pub struct RecordingUplink {
    pub bytes: Vec<u8>,
    pub stalled: bool,
}

impl RecordingUplink {
    /// Line-terminated blobs sent so far, without the line ending.
    pub fn blobs(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.bytes)
            .split_terminator("\r\n")
            .map(str::to_owned)
            .collect()
    }
}

impl Uplink for RecordingUplink {
    fn write(&mut self, byte: u8) -> nb::Result<(), UplinkError> {
        if self.stalled {
            return Err(nb::Error::WouldBlock);
        }
        self.bytes.push(byte);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingWatchdog {
    pub tripped_last_boot: bool,
    pub armed_with: Option<u32>,
    pub heartbeats: u32,
}

impl RecordingWatchdog {
    pub fn after_watchdog_reset() -> Self {
        Self {
            tripped_last_boot: true,
            ..Default::default()
        }
    }
}

impl Watchdog for RecordingWatchdog {
    fn caused_last_reset(&self) -> bool {
        self.tripped_last_boot
    }

    fn arm(&mut self, timeout_ms: u32) {
        self.armed_with = Some(timeout_ms);
    }

    fn heartbeat(&mut self) {
        self.heartbeats += 1;
    }
}

/// Port that only counts how often reception was re-armed.
#[derive(Default)]
pub struct CountingPort {
    pub armed: u32,
}

impl scanrelay::hal::CdcPort for CountingPort {
    fn schedule_receive(&mut self) {
        self.armed += 1;
    }
}

pub type TestEngine<'a> = scanrelay::RelayEngine<'a, RecordingUplink, RecordingWatchdog, ManualClock>;

/// Declares a queue, alert channel, clock, interrupt handle and engine in
/// the calling scope.
macro_rules! rig {
    ($isr:ident, $engine:ident, $clock:ident, $alerts:ident, $config:expr, $uplink:expr, $watchdog:expr) => {
        let mut queue: scanrelay::ingress::IngressQueue = scanrelay::ingress::IngressQueue::new();
        let $alerts = scanrelay::AlertChannel::new();
        let $clock = common::ManualClock::new();
        let (mut $isr, consumer) = scanrelay::ingress::split(&mut queue, &$alerts);
        let mut $engine: common::TestEngine<'_> =
            scanrelay::RelayEngine::new($config, consumer, &$alerts, $uplink, $watchdog, $clock.clone());
    };
}

pub fn feed(isr: &mut scanrelay::RelayIsr<'_>, bytes: &[u8]) {
    for &b in bytes {
        isr.on_byte_received(b).expect("ingress queue has room");
    }
}

/// Tick every `step_ms` from the clock's current time up to and including
/// `until_ms`, collecting each decision.
pub fn tick_until(
    engine: &mut TestEngine<'_>,
    clock: &ManualClock,
    until_ms: u64,
    step_ms: u64,
) -> Vec<(u64, scanrelay::FlushDecision)> {
    let mut decisions = Vec::new();
    while clock.now_ms() + step_ms <= until_ms {
        clock.advance(step_ms);
        let report = engine.tick();
        decisions.push((report.now_ms, report.decision));
    }
    decisions
}
