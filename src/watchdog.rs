//! Hardware watchdog coupling.
//!
//! The watchdog is the only way this device reboots. Detaching the scanner
//! sets the [`ResetLatch`]; from then on the heartbeat is withheld and the
//! hardware timer expires within `watchdog_timeout_ms`.
//!
//! On a clean power-on the relay waits `boot_settle_ms` before it arms the
//! watchdog and announces itself with a "Device turned on" alert. After a
//! watchdog-forced reset it skips both and runs immediately.

use crate::alert::{AlertKind, ResetLatch};
use crate::error::RelayError;
use serde::{Deserialize, Serialize};

pub trait Watchdog {
    /// True when the previous reset was caused by this watchdog expiring.
    fn caused_last_reset(&self) -> bool;
    fn arm(&mut self, timeout_ms: u32);
    fn heartbeat(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResetReason {
    PowerOn,
    Watchdog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatchdogPhase {
    Booting,
    Settling { ready_at_ms: u64 },
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heartbeat {
    Sent,
    Withheld,
    /// Watchdog not armed yet (still settling).
    Idle,
}

#[derive(Debug)]
pub struct WatchdogCoordinator<W> {
    watchdog: W,
    timeout_ms: u32,
    settle_ms: u64,
    phase: WatchdogPhase,
    withholding: bool,
}

impl<W: Watchdog> WatchdogCoordinator<W> {
    pub fn new(watchdog: W, timeout_ms: u32, settle_ms: u64) -> Self {
        Self {
            watchdog,
            timeout_ms,
            settle_ms,
            phase: WatchdogPhase::Booting,
            withholding: false,
        }
    }

    /// Inspect the reset cause and start the boot sequence.
    pub fn start(&mut self, now_ms: u64) -> ResetReason {
        let reason = if self.watchdog.caused_last_reset() {
            ResetReason::Watchdog
        } else {
            ResetReason::PowerOn
        };

        match reason {
            ResetReason::Watchdog => {
                tracing::info!("restarted by watchdog, skipping settle delay");
                self.arm();
            }
            ResetReason::PowerOn => {
                tracing::info!(settle_ms = self.settle_ms, "clean power-on, settling");
                self.phase = WatchdogPhase::Settling {
                    ready_at_ms: now_ms.saturating_add(self.settle_ms),
                };
            }
        }
        reason
    }

    /// Finish settling once its deadline passes. Returns the boot alert to
    /// announce, exactly once per clean power-on.
    pub fn poll_ready(&mut self, now_ms: u64) -> Option<AlertKind> {
        match self.phase {
            WatchdogPhase::Settling { ready_at_ms } if now_ms >= ready_at_ms => {
                self.arm();
                tracing::info!("device ready");
                Some(AlertKind::DeviceOn)
            }
            _ => None,
        }
    }

    /// Feed the watchdog unless a reset has been latched.
    pub fn service(&mut self, latch: &ResetLatch) -> Heartbeat {
        if self.phase != WatchdogPhase::Running {
            return Heartbeat::Idle;
        }

        if latch.is_set() {
            if !self.withholding {
                self.withholding = true;
                tracing::warn!(timeout_ms = self.timeout_ms, "{}", RelayError::ForcedReset);
            }
            return Heartbeat::Withheld;
        }

        self.watchdog.heartbeat();
        Heartbeat::Sent
    }

    fn arm(&mut self) {
        self.watchdog.arm(self.timeout_ms);
        self.phase = WatchdogPhase::Running;
    }

    pub fn is_ready(&self) -> bool {
        self.phase == WatchdogPhase::Running
    }

    pub fn phase(&self) -> WatchdogPhase {
        self.phase
    }

    pub fn watchdog(&self) -> &W {
        &self.watchdog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeWatchdog {
        tripped: bool,
        armed_with: Option<u32>,
        feeds: u32,
    }

    impl Watchdog for FakeWatchdog {
        fn caused_last_reset(&self) -> bool {
            self.tripped
        }
        fn arm(&mut self, timeout_ms: u32) {
            self.armed_with = Some(timeout_ms);
        }
        fn heartbeat(&mut self) {
            self.feeds += 1;
        }
    }

    #[test]
    fn test_power_on_settles_before_arming() {
        let mut coordinator = WatchdogCoordinator::new(FakeWatchdog::default(), 3_000, 15_000);
        assert_eq!(coordinator.start(0), ResetReason::PowerOn);
        assert_eq!(coordinator.phase(), WatchdogPhase::Settling { ready_at_ms: 15_000 });
        assert_eq!(coordinator.watchdog().armed_with, None);

        let latch = ResetLatch::new();
        assert_eq!(coordinator.service(&latch), Heartbeat::Idle);
        assert_eq!(coordinator.poll_ready(14_999), None);
        assert_eq!(coordinator.poll_ready(15_000), Some(AlertKind::DeviceOn));
        assert_eq!(coordinator.poll_ready(15_050), None);
        assert_eq!(coordinator.watchdog().armed_with, Some(3_000));
    }

    #[test]
    fn test_watchdog_reset_runs_immediately() {
        let watchdog = FakeWatchdog {
            tripped: true,
            ..Default::default()
        };
        let mut coordinator = WatchdogCoordinator::new(watchdog, 3_000, 15_000);

        assert_eq!(coordinator.start(0), ResetReason::Watchdog);
        assert!(coordinator.is_ready());
        assert_eq!(coordinator.poll_ready(20_000), None);
    }

    #[test]
    fn test_latch_withholds_heartbeat() {
        let mut coordinator = WatchdogCoordinator::new(FakeWatchdog::default(), 3_000, 0);
        coordinator.start(0);
        coordinator.poll_ready(0);

        let latch = ResetLatch::new();
        assert_eq!(coordinator.service(&latch), Heartbeat::Sent);

        latch.set();
        for _ in 0..10 {
            assert_eq!(coordinator.service(&latch), Heartbeat::Withheld);
        }
        assert_eq!(coordinator.watchdog().feeds, 1);
    }

    #[test]
    fn test_endless_settle_never_arms() {
        let mut coordinator = WatchdogCoordinator::new(FakeWatchdog::default(), 3_000, u64::MAX);
        assert_eq!(coordinator.start(5), ResetReason::PowerOn);
        assert_eq!(coordinator.phase(), WatchdogPhase::Settling { ready_at_ms: u64::MAX });
        assert_eq!(coordinator.poll_ready(1_000_000), None);
        assert_eq!(coordinator.watchdog().armed_with, None);
    }
}
