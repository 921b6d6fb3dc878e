//! Server configuration
//!
//! Defaults match the stock Raspberry Pi wiring. A TOML file can override any
//! field; durations in the file are given in milliseconds.

use iot_shared::limits;
use serde::Deserialize;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Which device backend to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverBackend {
    #[default]
    Simulated,
    Rpi,
}

/// GPIO pin numbers (BCM numbering)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PinConfig {
    pub led: u8,
    pub sensor: u8,
    /// BCD inputs A-D of the display decoder
    pub segment: [u8; 4],
    pub buzzer: u8,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            led: 12,
            sensor: 11,
            segment: [14, 15, 18, 23],
            buzzer: 21,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub pid_file: PathBuf,
    pub log_file: PathBuf,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            pid_file: PathBuf::from("/tmp/iot_server.pid"),
            log_file: PathBuf::from("/tmp/iot_server.log"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the session listener binds to
    pub listen_addr: SocketAddr,
    /// Maximum number of commands waiting for the device loop
    pub queue_capacity: usize,
    /// How long a session waits for a command's response
    #[serde(rename = "response_timeout_ms", with = "millis")]
    pub response_timeout: Duration,
    /// Idle wait of the device loop between sensor checks
    #[serde(rename = "poll_interval_ms", with = "millis")]
    pub poll_interval: Duration,
    pub driver: DriverBackend,
    pub pins: PinConfig,
    pub daemon: DaemonConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], limits::SERVER_PORT)),
            queue_capacity: limits::QUEUE_CAPACITY,
            response_timeout: Duration::from_millis(limits::RESPONSE_TIMEOUT_MS),
            poll_interval: Duration::from_millis(limits::POLL_INTERVAL_MS),
            driver: DriverBackend::default(),
            pins: PinConfig::default(),
            daemon: DaemonConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be at least 1".into()));
        }
        if self.response_timeout.is_zero() {
            return Err(ConfigError::Invalid("response_timeout_ms must be positive".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid("poll_interval_ms must be positive".into()));
        }

        let pins = &self.pins;
        let all = [pins.led, pins.sensor, pins.buzzer]
            .into_iter()
            .chain(pins.segment);
        let mut seen = HashSet::new();
        for pin in all {
            if !seen.insert(pin) {
                return Err(ConfigError::Invalid(format!("GPIO pin {} assigned twice", pin)));
            }
        }
        Ok(())
    }
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
