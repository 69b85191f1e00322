//! The relay main loop.
//!
//! One [`RelayEngine::tick`] per loop iteration, in a fixed order:
//!
//! 1. drain the interrupt-side ingress queue into the frame buffer
//! 2. finish boot settling, announcing the device once it is ready
//! 3. run the flush scheduler and transmit if it says so
//! 4. service the watchdog
//!
//! Nothing in a tick blocks, and no error leaves it: overflows, open records
//! and uplink failures are logged, counted and recovered locally.

use crate::alert::AlertChannel;
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::frame::{FrameBuffer, CARRIAGE_RETURN, DEFAULT_CAPACITY};
use crate::hal::Clock;
use crate::ingress::{IngressConsumer, DEFAULT_INGRESS_DEPTH};
use crate::scheduler::{FlushDecision, FlushPhase, FlushScheduler};
use crate::stats::RelayStats;
use crate::uplink::{Uplink, UplinkTransmitter};
use crate::watchdog::{Heartbeat, ResetReason, Watchdog, WatchdogCoordinator, WatchdogPhase};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub now_ms: u64,
    pub decision: FlushDecision,
    pub heartbeat: Heartbeat,
}

pub struct RelayEngine<
    'a,
    U,
    W,
    K,
    const C: usize = DEFAULT_CAPACITY,
    const Q: usize = DEFAULT_INGRESS_DEPTH,
> {
    config: RelayConfig,
    buffer: FrameBuffer<C>,
    ingress: IngressConsumer<'a, Q>,
    alerts: &'a AlertChannel,
    scheduler: FlushScheduler,
    transmitter: UplinkTransmitter<U>,
    watchdog: WatchdogCoordinator<W>,
    clock: K,
    stats: RelayStats,
}

impl<'a, U, W, K, const C: usize, const Q: usize> RelayEngine<'a, U, W, K, C, Q>
where
    U: Uplink,
    W: Watchdog,
    K: Clock,
{
    pub fn new(
        config: RelayConfig,
        ingress: IngressConsumer<'a, Q>,
        alerts: &'a AlertChannel,
        uplink: U,
        watchdog: W,
        clock: K,
    ) -> Self {
        Self {
            scheduler: FlushScheduler::new(config.flush_interval_ms, config.grace_increment_ms),
            transmitter: UplinkTransmitter::new(uplink, config.uplink_write_spins),
            watchdog: WatchdogCoordinator::new(watchdog, config.watchdog_timeout_ms, config.boot_settle_ms),
            buffer: FrameBuffer::new(),
            config,
            ingress,
            alerts,
            clock,
            stats: RelayStats::new(),
        }
    }

    /// Boot sequence: check the reset cause and arm or start settling.
    pub fn start(&mut self) -> ResetReason {
        let reason = self.watchdog.start(self.clock.now_ms());
        tracing::info!(?reason, capacity = C, flush_interval_ms = self.config.flush_interval_ms, "relay started");
        reason
    }

    pub fn tick(&mut self) -> TickReport {
        if self.watchdog.phase() == WatchdogPhase::Booting {
            self.start();
        }

        let now_ms = self.clock.now_ms();
        self.stats.ticks += 1;

        self.drain_ingress();

        if let Some(boot_alert) = self.watchdog.poll_ready(now_ms) {
            self.alerts.raise(boot_alert);
        }

        let decision = if self.watchdog.is_ready() {
            let decision = self.scheduler.tick(now_ms, &self.buffer, self.alerts.take());
            self.apply(decision);
            decision
        } else {
            FlushDecision::Hold
        };

        let heartbeat = self.watchdog.service(self.alerts.reset_latch());
        match heartbeat {
            Heartbeat::Sent => self.stats.heartbeats_sent += 1,
            Heartbeat::Withheld => self.stats.heartbeats_withheld += 1,
            Heartbeat::Idle => {}
        }

        TickReport {
            now_ms,
            decision,
            heartbeat,
        }
    }

    fn drain_ingress(&mut self) {
        let mut overflowed = 0u32;

        while let Some(byte) = self.ingress.dequeue() {
            self.stats.bytes_received += 1;
            match self.buffer.push(byte) {
                Ok(()) if byte == CARRIAGE_RETURN => self.stats.records_received += 1,
                Ok(()) => {}
                Err(_) => overflowed += 1,
            }
        }

        if overflowed > 0 {
            self.stats.bytes_dropped += overflowed;
            tracing::warn!(dropped = overflowed, capacity = C, "frame buffer full, bytes discarded");
        }
    }

    fn apply(&mut self, decision: FlushDecision) {
        match decision {
            FlushDecision::Urgent(kind) => {
                if !self.buffer.is_empty() {
                    tracing::warn!(
                        lost = self.buffer.len(),
                        alert = ?kind,
                        "urgent alert overwrites unsent data"
                    );
                }
                self.buffer.overwrite(kind.message().as_bytes());
                self.send();
                self.stats.urgent_sent += 1;
            }
            FlushDecision::Flush => {
                self.send();
                self.stats.batches_sent += 1;
            }
            FlushDecision::Extend => self.stats.grace_extensions += 1,
            FlushDecision::Idle | FlushDecision::Hold => {}
        }
    }

    fn send(&mut self) {
        let transmission = self.transmitter.transmit(&mut self.buffer);
        if let Err(e) = transmission.outcome {
            self.stats.uplink_failures += 1;
            tracing::warn!(
                bytes = transmission.payload.len(),
                error = %RelayError::from(e),
                "uplink write incomplete, batch discarded"
            );
        }
    }

    pub fn stats(&self) -> &RelayStats {
        &self.stats
    }

    pub fn buffer(&self) -> &FrameBuffer<C> {
        &self.buffer
    }

    pub fn flush_phase(&self) -> FlushPhase {
        self.scheduler.phase()
    }

    pub fn flush_deadline_ms(&self) -> Option<u64> {
        self.scheduler.deadline_ms()
    }

    pub fn watchdog_phase(&self) -> WatchdogPhase {
        self.watchdog.phase()
    }

    pub fn reset_requested(&self) -> bool {
        self.alerts.reset_requested()
    }

    pub fn uplink(&self) -> &U {
        self.transmitter.uplink()
    }

    pub fn watchdog(&self) -> &W {
        self.watchdog.watchdog()
    }
}
