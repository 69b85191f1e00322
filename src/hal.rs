//! Board-layer seams the relay depends on.
//!
//! The USB host stack, UART pins and timers live outside this crate. The relay
//! only sees them through these traits, which keeps the engine testable with
//! a hand-driven clock.

use std::time::Instant;

/// Monotonic millisecond clock.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Receive side of the attached CDC device.
pub trait CdcPort {
    /// Queue the next receive transfer so more scanner bytes can arrive.
    fn schedule_receive(&mut self);
}

/// Host clock counting from construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}
