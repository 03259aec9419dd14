//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `monitor.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - SourceConfig: Where the sensor table lives and how to read it.
//!     - PollingConfig: How often the poller runs and how much history to keep.
//!     - DeviceConfig: Device identity and the (optional) control endpoint.
//!     - LoggingConfig: Log level and per-reading output.
//!     - ServerConfig: Dashboard bind address.
//!
//! ==============================================================================

use crate::domain::HISTORY_CAPACITY;
use crate::fetcher::{PayloadFormat, DEFAULT_CACHE_TTL, DEFAULT_TIMEOUT};
use crate::poller::ReadingStrategy;

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

pub const MIN_INTERVAL_SECS: u64 = 5;
pub const MAX_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_INTERVAL_SECS: u64 = 10;

pub const DEFAULT_SOURCE_URL: &str =
    "https://raw.githubusercontent.com/BurstSoftware/iot-api-guide-v1/main/sensor_data.csv";

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct MonitorConfig {
    pub source: SourceConfig,
    pub polling: PollingConfig,
    pub device: DeviceConfig,
    pub logging: LoggingConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SourceConfig {
    pub url: String,
    pub format: PayloadFormat,
    pub strategy: ReadingStrategy,
    pub timeout_seconds: u64,
    /// 0 disables caching
    pub cache_ttl_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_seconds: u64,
    pub history_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DeviceConfig {
    pub device_id: String,
    /// passed through to the control endpoint, never logged
    pub api_key: String,
    pub control_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_sensor_data: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            format: PayloadFormat::Csv,
            strategy: ReadingStrategy::Replay,
            timeout_seconds: DEFAULT_TIMEOUT.as_secs(),
            cache_ttl_seconds: DEFAULT_CACHE_TTL.as_secs(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_seconds: DEFAULT_INTERVAL_SECS,
            history_capacity: HISTORY_CAPACITY,
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_id: "sensor-01".to_string(),
            api_key: String::new(),
            control_url: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), show_sensor_data: true }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0:3000".to_string() }
    }
}

impl MonitorConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file {}", path.as_ref().display()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).context("Failed to parse config")
    }

    /// Load with default fallback
    ///
    /// runs before logging is initialised, so it reports on stdout.
    pub fn load_or_default() -> Self {
        let paths = [
            PathBuf::from("config").join("monitor.toml"),
            PathBuf::from("..").join("config").join("monitor.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        println!("[CONFIG] Warning: Failed to load {}: {:#}", path.display(), e);
                    }
                }
            }
        }

        println!("[CONFIG] Warning: No config file found - using defaults");
        Self::default()
    }

    /// Poll interval, clamped to the supported 5-60s range
    pub fn polling_interval(&self) -> Duration {
        let secs = self.polling.interval_seconds.clamp(MIN_INTERVAL_SECS, MAX_INTERVAL_SECS);
        if secs != self.polling.interval_seconds {
            warn!(
                "[CONFIG] interval_seconds={} out of range, using {}s",
                self.polling.interval_seconds, secs
            );
        }
        Duration::from_secs(secs)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source.timeout_seconds.max(1))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.source.cache_ttl_seconds)
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("┌─────────────────────────────────────────┐");
        println!("│          MONITOR CONFIGURATION          │");
        println!("├─────────────────────────────────────────┤");
        println!("│ Source: {}", self.source.url);
        println!("│ Format: {:?} / Strategy: {:?}", self.source.format, self.source.strategy);
        println!("│ Device ID: {}", self.device.device_id);
        println!("│ Poll Interval: {}s", self.polling_interval().as_secs());
        println!("│ Cache TTL: {}s", self.source.cache_ttl_seconds);
        println!("│ Log Level: {}", self.logging.level);
        println!("└─────────────────────────────────────────┘");
    }
}
