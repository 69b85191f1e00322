//! Accumulation buffer for the scanner byte stream.
//!
//! Records coming off the scanner end in a carriage return. Instead of storing
//! the `\r` verbatim the buffer writes a [`TERMINATOR`] byte, so several short
//! records can sit side by side and leave in a single uplink transmission:
//!
//! ```text
//! scanner:  4 0 0 1 \r 4 0 0 2 \r 7 7
//! buffer:   4 0 0 1 |  4 0 0 2 |  7 7      <- trailing record still open
//! ```

use crate::error::RelayError;
use heapless::Vec;

/// Byte written in place of a carriage return.
pub const TERMINATOR: u8 = b'|';
pub const CARRIAGE_RETURN: u8 = b'\r';

/// Capacity used by the stock firmware build.
pub const DEFAULT_CAPACITY: usize = 200;

pub type Snapshot<const C: usize> = Vec<u8, C>;

#[derive(Debug, Clone)]
pub struct FrameBuffer<const C: usize = DEFAULT_CAPACITY> {
    storage: Vec<u8, C>,
}

impl<const C: usize> FrameBuffer<C> {
    pub const fn new() -> Self {
        Self { storage: Vec::new() }
    }

    /// Append one byte, translating `\r` into the record terminator.
    ///
    /// A full buffer discards the byte and reports `BufferOverflow`; bytes
    /// already stored are left untouched.
    pub fn push(&mut self, byte: u8) -> Result<(), RelayError> {
        let stored = if byte == CARRIAGE_RETURN { TERMINATOR } else { byte };

        self.storage
            .push(stored)
            .map_err(|_| RelayError::BufferOverflow { capacity: C })
    }

    /// Replace the whole content with `message`, starting at byte 0.
    ///
    /// Used for urgent alerts. Anything accumulated before is lost. A message
    /// longer than the capacity is truncated.
    pub fn overwrite(&mut self, message: &[u8]) {
        self.storage.clear();
        let take = message.len().min(C);
        // Cannot fail: `take` is bounded by the capacity.
        let _ = self.storage.extend_from_slice(&message[..take]);
    }

    /// Hand the current content to the caller and leave the buffer empty.
    pub fn snapshot_and_clear(&mut self) -> Snapshot<C> {
        core::mem::replace(&mut self.storage, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn ends_with_terminator(&self) -> bool {
        self.storage.last() == Some(&TERMINATOR)
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub const fn capacity(&self) -> usize {
        C
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.storage
    }
}

impl<const C: usize> Default for FrameBuffer<C> {
    fn default() -> Self {
        Self::new()
    }
}
