use crate::alert::MAX_ALERT_LEN;
use crate::error::ConfigError;
use crate::frame::DEFAULT_CAPACITY;
use serde::{Deserialize, Serialize};
use static_assertions::const_assert;
use std::path::Path;

pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_GRACE_INCREMENT_MS: u64 = 100;
pub const DEFAULT_WATCHDOG_TIMEOUT_MS: u32 = 3_000;
pub const DEFAULT_BOOT_SETTLE_MS: u64 = 15_000;
pub const DEFAULT_UPLINK_WRITE_SPINS: u32 = 64;

// Urgent messages must survive the overwrite untruncated in the stock build.
const_assert!(MAX_ALERT_LEN <= DEFAULT_CAPACITY);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub flush_interval_ms: u64,
    pub grace_increment_ms: u64,
    pub watchdog_timeout_ms: u32,
    pub boot_settle_ms: u64,
    pub uplink_write_spins: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            grace_increment_ms: DEFAULT_GRACE_INCREMENT_MS,
            watchdog_timeout_ms: DEFAULT_WATCHDOG_TIMEOUT_MS,
            boot_settle_ms: DEFAULT_BOOT_SETTLE_MS,
            uplink_write_spins: DEFAULT_UPLINK_WRITE_SPINS,
        }
    }
}

impl RelayConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flush_interval_ms == 0 {
            return Err(ConfigError::Invalid("flush_interval_ms must be non-zero"));
        }
        if self.watchdog_timeout_ms == 0 {
            return Err(ConfigError::Invalid("watchdog_timeout_ms must be non-zero"));
        }
        Ok(())
    }

    /// The main loop has to feed the watchdog more often than it expires.
    pub fn check_tick_period(&self, tick_ms: u64) -> Result<(), ConfigError> {
        if tick_ms == 0 {
            return Err(ConfigError::Invalid("tick period must be non-zero"));
        }
        if tick_ms >= u64::from(self.watchdog_timeout_ms) {
            return Err(ConfigError::Invalid("tick period must be shorter than watchdog_timeout_ms"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_firmware() {
        let config = RelayConfig::default();
        assert_eq!(config.flush_interval_ms, 10_000);
        assert_eq!(config.grace_increment_ms, 100);
        assert_eq!(config.watchdog_timeout_ms, 3_000);
        assert_eq!(config.boot_settle_ms, 15_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = RelayConfig::from_json_str(r#"{ "flush_interval_ms": 2000, "boot_settle_ms": 0 }"#).unwrap();
        assert_eq!(config.flush_interval_ms, 2_000);
        assert_eq!(config.boot_settle_ms, 0);
        assert_eq!(config.grace_increment_ms, DEFAULT_GRACE_INCREMENT_MS);
    }

    #[test]
    fn test_rejects_zero_interval() {
        let result = RelayConfig::from_json_str(r#"{ "flush_interval_ms": 0 }"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_malformed_json() {
        let result = RelayConfig::from_json_str("{ flush_interval_ms: ");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_tick_period_against_watchdog() {
        let config = RelayConfig::default();
        assert!(config.check_tick_period(50).is_ok());
        assert!(config.check_tick_period(3_000).is_err());
        assert!(config.check_tick_period(0).is_err());
    }
}
