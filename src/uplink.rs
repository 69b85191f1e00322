use crate::error::UplinkError;
use crate::frame::{FrameBuffer, Snapshot};

/// Every blob on the uplink ends with this.
pub const LINE_ENDING: &[u8] = b"\r\n";

/// Outbound serial link toward the controller, written a byte at a time in
/// the usual `nb` style of UART drivers.
pub trait Uplink {
    fn write(&mut self, byte: u8) -> nb::Result<(), UplinkError>;

    fn flush(&mut self) -> nb::Result<(), UplinkError> {
        Ok(())
    }
}

/// What happened to one transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmission<const C: usize> {
    pub payload: Snapshot<C>,
    pub outcome: Result<(), UplinkError>,
}

/// Hands buffer content to the uplink. There is no acknowledgment on the
/// link: whatever the write outcome, the buffer is emptied.
#[derive(Debug)]
pub struct UplinkTransmitter<U> {
    uplink: U,
    write_spins: u32,
}

impl<U: Uplink> UplinkTransmitter<U> {
    pub fn new(uplink: U, write_spins: u32) -> Self {
        Self { uplink, write_spins }
    }

    pub fn transmit<const C: usize>(&mut self, buffer: &mut FrameBuffer<C>) -> Transmission<C> {
        let outcome = self.send(buffer.as_bytes());
        let payload = buffer.snapshot_and_clear();

        if outcome.is_ok() {
            tracing::info!(
                bytes = payload.len(),
                payload = %String::from_utf8_lossy(&payload),
                "sent to uplink"
            );
        }

        Transmission { payload, outcome }
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), UplinkError> {
        let mut written = 0;
        for &byte in bytes.iter().chain(LINE_ENDING) {
            self.write_byte(byte, written)?;
            written += 1;
        }
        self.spin(written, |uplink| uplink.flush())
    }

    fn write_byte(&mut self, byte: u8, written: usize) -> Result<(), UplinkError> {
        self.spin(written, |uplink| uplink.write(byte))
    }

    // Retry `WouldBlock` a bounded number of times so a stuck link cannot
    // hold up the main loop.
    fn spin<F>(&mut self, written: usize, mut op: F) -> Result<(), UplinkError>
    where
        F: FnMut(&mut U) -> nb::Result<(), UplinkError>,
    {
        for _ in 0..=self.write_spins {
            match op(&mut self.uplink) {
                Ok(()) => return Ok(()),
                Err(nb::Error::WouldBlock) => continue,
                Err(nb::Error::Other(e)) => return Err(e),
            }
        }
        Err(UplinkError::Stalled { written })
    }

    pub fn uplink(&self) -> &U {
        &self.uplink
    }
}
