use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UplinkError {
    /// The link kept answering `WouldBlock` past the configured retry budget.
    #[error("uplink stalled after {written} bytes")]
    Stalled { written: usize },
    #[error("uplink hardware fault: {0}")]
    Hardware(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("frame buffer full ({capacity} bytes), byte discarded")]
    BufferOverflow { capacity: usize },
    #[error("ingress queue full, byte discarded")]
    IngressFull,
    #[error("flush deadline reached without a record terminator")]
    IncompleteFrame,
    #[error("uplink error: {0}")]
    Uplink(#[from] UplinkError),
    #[error("reset latched, watchdog heartbeat withheld")]
    ForcedReset,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}
