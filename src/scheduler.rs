use crate::alert::AlertKind;
use crate::error::RelayError;
use crate::frame::FrameBuffer;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlushPhase {
    Idle,
    Accumulating,
    Grace,
}

/// Outcome of one scheduler tick. The engine carries out the transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushDecision {
    /// Nothing buffered.
    Idle,
    /// Deadline not reached yet.
    Hold,
    /// Deadline reached but the last record is still open.
    Extend,
    /// Send the buffered batch.
    Flush,
    /// Overwrite the buffer with the alert text and send it now.
    Urgent(AlertKind),
}

/// Accumulation window bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushTimer {
    pub anchor_ms: Option<u64>,
    pub grace_extension_ms: u64,
}

#[derive(Debug, Clone)]
pub struct FlushScheduler {
    timer: FlushTimer,
    flush_interval_ms: u64,
    grace_increment_ms: u64,
}

impl FlushScheduler {
    pub fn new(flush_interval_ms: u64, grace_increment_ms: u64) -> Self {
        Self {
            timer: FlushTimer::default(),
            flush_interval_ms,
            grace_increment_ms,
        }
    }

    /// Decide what to do with the buffer on this tick.
    ///
    /// The window is anchored lazily on the first tick that sees it unset, so
    /// a record's deadline can be up to one tick later than its arrival.
    pub fn tick<const C: usize>(
        &mut self,
        now_ms: u64,
        buffer: &FrameBuffer<C>,
        alert: Option<AlertKind>,
    ) -> FlushDecision {
        let anchor = *self.timer.anchor_ms.get_or_insert(now_ms);

        if let Some(kind) = alert {
            self.reset();
            return FlushDecision::Urgent(kind);
        }

        if buffer.is_empty() {
            self.reset();
            return FlushDecision::Idle;
        }

        let elapsed = now_ms.saturating_sub(anchor);
        if elapsed < self.flush_interval_ms.saturating_add(self.timer.grace_extension_ms) {
            return FlushDecision::Hold;
        }

        tracing::debug!(
            elapsed_ms = elapsed,
            buffer = %String::from_utf8_lossy(buffer.as_bytes()),
            "flush deadline reached"
        );

        if !buffer.ends_with_terminator() {
            // Set, not added: repeated misses keep re-checking every tick
            // past the extended deadline.
            self.timer.grace_extension_ms = self.grace_increment_ms;
            tracing::debug!(
                error = %RelayError::IncompleteFrame,
                grace_ms = self.grace_increment_ms,
                "extending deadline"
            );
            return FlushDecision::Extend;
        }

        self.reset();
        FlushDecision::Flush
    }

    fn reset(&mut self) {
        self.timer = FlushTimer::default();
    }

    pub fn phase(&self) -> FlushPhase {
        match self.timer {
            FlushTimer { anchor_ms: None, .. } => FlushPhase::Idle,
            FlushTimer { grace_extension_ms: 0, .. } => FlushPhase::Accumulating,
            _ => FlushPhase::Grace,
        }
    }

    pub fn timer(&self) -> &FlushTimer {
        &self.timer
    }

    /// Time at which the current window becomes due, if one is running.
    pub fn deadline_ms(&self) -> Option<u64> {
        self.timer
            .anchor_ms
            .map(|anchor| {
                anchor
                    .saturating_add(self.flush_interval_ms)
                    .saturating_add(self.timer.grace_extension_ms)
            })
    }
}
