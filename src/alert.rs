use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use serde::{Deserialize, Serialize};

pub const DEVICE_TURNED_ON: &str = "Device turned on";
pub const SCANNER_CONNECTED: &str = "Scanner Connected";
pub const SCANNER_DISCONNECTED: &str = "Scanner Disconnected";

/// Longest urgent message, used to size-check buffer capacities.
pub const MAX_ALERT_LEN: usize = SCANNER_DISCONNECTED.len();

const SLOT_EMPTY: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertKind {
    DeviceOn,
    Connected,
    Disconnected,
}

impl AlertKind {
    pub fn message(self) -> &'static str {
        match self {
            AlertKind::DeviceOn => DEVICE_TURNED_ON,
            AlertKind::Connected => SCANNER_CONNECTED,
            AlertKind::Disconnected => SCANNER_DISCONNECTED,
        }
    }

    fn encode(self) -> u8 {
        match self {
            AlertKind::DeviceOn => 1,
            AlertKind::Connected => 2,
            AlertKind::Disconnected => 3,
        }
    }

    fn decode(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(AlertKind::DeviceOn),
            2 => Some(AlertKind::Connected),
            3 => Some(AlertKind::Disconnected),
            _ => None,
        }
    }
}

/// Permanent reboot request. Once set it stays set until the process dies.
#[derive(Debug, Default)]
pub struct ResetLatch(AtomicBool);

impl ResetLatch {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Single-slot mailbox for device-presence transitions.
///
/// Written from USB callback context, drained by the main loop. There is no
/// queue: a newer alert replaces one that was not consumed yet. Each
/// operation is one atomic access, so neither side can observe a torn slot.
#[derive(Debug, Default)]
pub struct AlertChannel {
    pending: AtomicU8,
    latch: ResetLatch,
}

impl AlertChannel {
    pub const fn new() -> Self {
        Self {
            pending: AtomicU8::new(SLOT_EMPTY),
            latch: ResetLatch::new(),
        }
    }

    pub fn raise(&self, kind: AlertKind) {
        if kind == AlertKind::Disconnected {
            self.latch.set();
        }

        let previous = self.pending.swap(kind.encode(), Ordering::AcqRel);
        if let Some(lost) = AlertKind::decode(previous) {
            tracing::debug!(?lost, replacement = ?kind, "unconsumed alert overwritten");
        }
    }

    pub fn take(&self) -> Option<AlertKind> {
        AlertKind::decode(self.pending.swap(SLOT_EMPTY, Ordering::AcqRel))
    }

    pub fn reset_latch(&self) -> &ResetLatch {
        &self.latch
    }

    pub fn reset_requested(&self) -> bool {
        self.latch.is_set()
    }
}
