//! Agent configuration, loaded from environment variables.
//!
//! Every knob has a documented default so the agent starts with no
//! configuration at all. Invalid numeric values fall back to their
//! defaults with a warning rather than aborting startup.

use sysinfo::System;
use tracing::warn;

use crate::error::{AgentError, Result};
use crate::{DEFAULT_HIGH_INTERVAL_MS, DEFAULT_LOW_INTERVAL_MS, DEFAULT_MEDIUM_INTERVAL_MS};

/// Collection intervals per tier, in milliseconds.
#[derive(Debug, Clone)]
pub struct IntervalsConfig {
    pub high_ms: u64,
    pub medium_ms: u64,
    pub low_ms: u64,
}

impl Default for IntervalsConfig {
    fn default() -> Self {
        Self {
            high_ms: DEFAULT_HIGH_INTERVAL_MS,
            medium_ms: DEFAULT_MEDIUM_INTERVAL_MS,
            low_ms: DEFAULT_LOW_INTERVAL_MS,
        }
    }
}

/// Per-probe enable flags. The system probe has no flag; it always
/// runs with the low tier.
#[derive(Debug, Clone)]
pub struct CollectorsConfig {
    pub battery: bool,
    pub thermal: bool,
    pub cpu: bool,
    pub gpu: bool,
    pub memory: bool,
    pub network: bool,
    pub storage: bool,
    pub sensors: bool,
    pub processes: bool,
}

impl Default for CollectorsConfig {
    fn default() -> Self {
        Self {
            battery: true,
            thermal: true,
            cpu: true,
            gpu: true,
            memory: true,
            network: true,
            storage: true,
            sensors: true,
            processes: true,
        }
    }
}

/// Delivery behavior towards the collector endpoint.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Attempts per envelope, including the first
    pub retry_count: u32,
    /// Base backoff; attempt n waits n times this long
    pub retry_delay_ms: u64,
    /// Per-attempt request timeout
    pub timeout_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            retry_count: 3,
            retry_delay_ms: 1000,
            timeout_ms: 10_000,
        }
    }
}

/// Offline buffer behavior.
#[derive(Debug, Clone)]
pub struct BufferConfig {
    pub enabled: bool,
    pub max_size: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: 1000,
        }
    }
}

/// Complete agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Collector telemetry endpoint
    pub server_url: String,
    /// Bearer token; empty disables the Authorization header
    pub api_key: String,
    /// Identifier sent with every envelope
    pub device_id: String,
    pub intervals: IntervalsConfig,
    pub collectors: CollectorsConfig,
    /// Process list size cap for the process probe
    pub max_processes: usize,
    pub delivery: DeliveryConfig,
    pub buffer: BufferConfig,
    /// Log instead of sending; no network I/O at all
    pub dry_run: bool,
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:3000/api/telemetry".to_string(),
            api_key: String::new(),
            device_id: default_device_id(),
            intervals: IntervalsConfig::default(),
            collectors: CollectorsConfig::default(),
            max_processes: 50,
            delivery: DeliveryConfig::default(),
            buffer: BufferConfig::default(),
            dry_run: false,
            log_level: "info".to_string(),
        }
    }
}

impl AgentConfig {
    /// Load the configuration from the environment, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_url: env_string("TELEMETRY_SERVER_URL", defaults.server_url),
            api_key: env_string("TELEMETRY_API_KEY", defaults.api_key),
            device_id: env_string("DEVICE_ID", defaults.device_id),
            intervals: IntervalsConfig {
                high_ms: env_u64("HIGH_FREQ_INTERVAL_MS", defaults.intervals.high_ms),
                medium_ms: env_u64("MEDIUM_FREQ_INTERVAL_MS", defaults.intervals.medium_ms),
                low_ms: env_u64("LOW_FREQ_INTERVAL_MS", defaults.intervals.low_ms),
            },
            collectors: CollectorsConfig {
                battery: env_bool("COLLECT_BATTERY", true),
                thermal: env_bool("COLLECT_THERMAL", true),
                cpu: env_bool("COLLECT_CPU", true),
                gpu: env_bool("COLLECT_GPU", true),
                memory: env_bool("COLLECT_MEMORY", true),
                network: env_bool("COLLECT_NETWORK", true),
                storage: env_bool("COLLECT_STORAGE", true),
                sensors: env_bool("COLLECT_SENSORS", true),
                processes: env_bool("COLLECT_PROCESSES", true),
            },
            max_processes: env_u64("MAX_PROCESSES", defaults.max_processes as u64) as usize,
            delivery: DeliveryConfig {
                retry_count: env_u64("API_RETRY_COUNT", u64::from(defaults.delivery.retry_count))
                    as u32,
                retry_delay_ms: env_u64("API_RETRY_DELAY_MS", defaults.delivery.retry_delay_ms),
                timeout_ms: env_u64("API_TIMEOUT_MS", defaults.delivery.timeout_ms),
            },
            buffer: BufferConfig {
                enabled: env_bool("ENABLE_OFFLINE_BUFFER", true),
                max_size: env_u64("OFFLINE_BUFFER_MAX_SIZE", defaults.buffer.max_size as u64)
                    as usize,
            },
            dry_run: env_bool("DRY_RUN", false),
            log_level: env_string("LOG_LEVEL", defaults.log_level),
        }
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.server_url.trim().is_empty() {
            return Err(AgentError::config_error(
                "TELEMETRY_SERVER_URL must not be empty",
            ));
        }
        if self.delivery.retry_count == 0 {
            return Err(AgentError::config_error(
                "API_RETRY_COUNT must be at least 1",
            ));
        }
        if self.delivery.timeout_ms == 0 {
            return Err(AgentError::config_error(
                "API_TIMEOUT_MS must be greater than zero",
            ));
        }
        if self.intervals.high_ms == 0 || self.intervals.medium_ms == 0 || self.intervals.low_ms == 0
        {
            return Err(AgentError::config_error(
                "collection intervals must be greater than zero",
            ));
        }
        if self.buffer.max_size == 0 {
            return Err(AgentError::config_error(
                "OFFLINE_BUFFER_MAX_SIZE must be at least 1",
            ));
        }
        Ok(())
    }
}

fn default_device_id() -> String {
    System::host_name().unwrap_or_else(|| "unknown-device".to_string())
}

fn env_string(key: &str, default: String) -> String {
    std::env::var(key)
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    let Ok(raw) = std::env::var(key) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(
                "Invalid value {:?} for {}, using default {}",
                raw, key, default
            );
            default
        }
    }
}

/// Set variables accept `1`, `true` or `yes` (any case) as true;
/// anything else is false. Unset variables keep the default.
fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(raw) => parse_bool(&raw),
        Err(_) => default,
    }
}

pub(crate) fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documentation() {
        let config = AgentConfig::default();

        assert_eq!(config.server_url, "http://localhost:3000/api/telemetry");
        assert_eq!(config.api_key, "");
        assert_eq!(config.intervals.high_ms, 5000);
        assert_eq!(config.intervals.medium_ms, 60_000);
        assert_eq!(config.intervals.low_ms, 300_000);
        assert_eq!(config.max_processes, 50);
        assert_eq!(config.delivery.retry_count, 3);
        assert_eq!(config.delivery.retry_delay_ms, 1000);
        assert_eq!(config.delivery.timeout_ms, 10_000);
        assert!(config.buffer.enabled);
        assert_eq!(config.buffer.max_size, 1000);
        assert!(!config.dry_run);
        assert_eq!(config.log_level, "info");
        assert!(config.collectors.battery);
        assert!(config.collectors.processes);
    }

    #[test]
    fn test_parse_bool_spellings() {
        assert!(parse_bool("1"));
        assert!(parse_bool("true"));
        assert!(parse_bool("YES"));
        assert!(parse_bool(" True "));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("no"));
        assert!(!parse_bool("banana"));
    }

    #[test]
    fn test_env_u64_invalid_value_falls_back() {
        std::env::set_var("PHONEHOME_TEST_BAD_U64", "not-a-number");
        assert_eq!(env_u64("PHONEHOME_TEST_BAD_U64", 42), 42);
        std::env::remove_var("PHONEHOME_TEST_BAD_U64");

        std::env::set_var("PHONEHOME_TEST_GOOD_U64", "7500");
        assert_eq!(env_u64("PHONEHOME_TEST_GOOD_U64", 42), 7500);
        std::env::remove_var("PHONEHOME_TEST_GOOD_U64");
    }

    #[test]
    fn test_validate_rejects_empty_server_url() {
        let config = AgentConfig {
            server_url: "  ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_retry_count() {
        let mut config = AgentConfig::default();
        config.delivery.retry_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = AgentConfig::default();
        config.intervals.medium_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(AgentConfig::default().validate().is_ok());
    }
}
