//! # Scanner Relay
//!
//! Device-side relay between a USB-serial barcode scanner (attached as a host
//! side CDC device) and a controller on a second serial uplink. Scanner
//! records are batched and forwarded on a fixed cadence; scanner attach and
//! detach are reported immediately, and a detach reboots the device through
//! its hardware watchdog.
//!
//! ## Quick Start
//!
//! ```rust
//! use scanrelay::hal::MonotonicClock;
//! use scanrelay::ingress::{self, IngressQueue};
//! use scanrelay::uplink::Uplink;
//! use scanrelay::watchdog::Watchdog;
//! use scanrelay::{AlertChannel, RelayConfig, RelayEngine, UplinkError};
//!
//! struct Uart;
//! impl Uplink for Uart {
//!     fn write(&mut self, _byte: u8) -> nb::Result<(), UplinkError> {
//!         Ok(())
//!     }
//! }
//!
//! struct Iwdg;
//! impl Watchdog for Iwdg {
//!     fn caused_last_reset(&self) -> bool { false }
//!     fn arm(&mut self, _timeout_ms: u32) {}
//!     fn heartbeat(&mut self) {}
//! }
//!
//! let mut queue: IngressQueue = IngressQueue::new();
//! let alerts = AlertChannel::new();
//! let (mut isr, consumer) = ingress::split(&mut queue, &alerts);
//!
//! let config = RelayConfig { boot_settle_ms: 0, ..Default::default() };
//! let mut engine: RelayEngine<_, _, _> =
//!     RelayEngine::new(config, consumer, &alerts, Uart, Iwdg, MonotonicClock::new());
//! engine.start();
//! engine.tick(); // sends "Device turned on"
//!
//! // Interrupt context
//! for b in b"4006381333931\r" {
//!     let _ = isr.on_byte_received(*b);
//! }
//!
//! // Main loop
//! engine.tick();
//! assert_eq!(engine.buffer().as_bytes(), b"4006381333931|");
//! ```
//!
//! ## Architecture
//!
//! - [`frame`] - accumulation buffer with `\r` to `|` record framing
//! - [`alert`] - attach/detach mailbox and the reset latch
//! - [`ingress`] - interrupt-side handle and SPSC byte queue
//! - [`scheduler`] - flush timing: deadline, grace extension, urgent bypass
//! - [`uplink`] - transmission to the controller link
//! - [`watchdog`] - boot settling, heartbeat, starve-to-reboot
//! - [`engine`] - the per-tick main loop tying them together

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod alert;
pub mod config;
pub mod engine;
pub mod error;
pub mod frame;
pub mod hal;
pub mod ingress;
pub mod scheduler;
pub mod stats;
pub mod uplink;
pub mod watchdog;

// Re-export main public types for convenience
pub use alert::{AlertChannel, AlertKind, ResetLatch};
pub use config::RelayConfig;
pub use engine::{RelayEngine, TickReport};
pub use error::{ConfigError, RelayError, UplinkError};
pub use frame::FrameBuffer;
pub use ingress::RelayIsr;
pub use scheduler::{FlushDecision, FlushPhase};
pub use stats::RelayStats;
pub use watchdog::{ResetReason, WatchdogPhase};
