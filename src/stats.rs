use arrayvec::ArrayString;
use core::fmt::Write;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayStats {
    pub bytes_received: u32,
    pub bytes_dropped: u32,
    pub records_received: u32,
    pub batches_sent: u32,
    pub urgent_sent: u32,
    pub uplink_failures: u32,
    pub grace_extensions: u32,
    pub heartbeats_sent: u32,
    pub heartbeats_withheld: u32,
    pub ticks: u64,
}

impl RelayStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// One-line status without touching the heap.
    pub fn summary(&self) -> ArrayString<192> {
        let mut line = ArrayString::new();
        // Worst case fits comfortably; a truncated summary is harmless.
        let _ = write!(
            line,
            "rx={}B/{}rec drop={} sent={}+{}urgent fail={} grace={} wd={}/{}withheld",
            self.bytes_received,
            self.records_received,
            self.bytes_dropped,
            self.batches_sent,
            self.urgent_sent,
            self.uplink_failures,
            self.grace_extensions,
            self.heartbeats_sent,
            self.heartbeats_withheld,
        );
        line
    }
}
