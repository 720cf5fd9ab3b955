//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files and the
//! environment.
//!
//! Every field has a default, so a missing file or missing table is fine.
//! The serial device and baud rate can additionally be overridden with the
//! `SER_DEV` and `BAUD` environment variables.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{Result, RoverBridgeError};

/// Environment variable naming an optional TOML config file
pub const CONFIG_PATH_ENV: &str = "ROVER_BRIDGE_CONFIG";
/// Environment variable overriding the serial device path
pub const SERIAL_DEVICE_ENV: &str = "SER_DEV";
/// Environment variable overriding the baud rate
pub const BAUD_RATE_ENV: &str = "BAUD";

/// Baud rates accepted by validation
const SUPPORTED_BAUD_RATES: &[u32] = &[9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600];

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub recorder: RecorderConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

/// HTTP listener configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_http_port")]
    pub port: u16,
}

/// Session recorder configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RecorderConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Bytes returned by the event-tail endpoint
    #[serde(default = "default_tail_bytes")]
    pub tail_bytes: u64,
}

/// Telemetry ingest configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 115200 }
fn default_read_timeout_ms() -> u64 { 200 }

fn default_bind_addr() -> String { "0.0.0.0".to_string() }
fn default_http_port() -> u16 { 8000 }

fn default_log_dir() -> String { "runlogs".to_string() }
fn default_heartbeat_interval_ms() -> u64 { 5000 }
fn default_tail_bytes() -> u64 { 2048 }

fn default_poll_interval_ms() -> u64 { 50 }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_http_port(),
        }
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            tail_bytes: default_tail_bytes(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rover_bridge::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from the process environment
    ///
    /// Loads the file named by `ROVER_BRIDGE_CONFIG` when set, otherwise
    /// starts from defaults, then applies `SER_DEV` / `BAUD`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an injectable variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_PATH_ENV) {
            Some(path) if !path.is_empty() => {
                let contents = fs::read_to_string(&path)?;
                toml::from_str(&contents)?
            }
            _ => Config::default(),
        };
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `SER_DEV` and `BAUD` overrides
    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup(SERIAL_DEVICE_ENV) {
            self.serial.port = port;
        }

        if let Some(baud) = lookup(BAUD_RATE_ENV) {
            self.serial.baud_rate = baud.trim().parse().map_err(|_| {
                RoverBridgeError::InvalidConfig(format!("{} is not a number: {:?}", BAUD_RATE_ENV, baud))
            })?;
        }

        Ok(())
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if !SUPPORTED_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(invalid(format!(
                "baud_rate must be one of: {:?}",
                SUPPORTED_BAUD_RATES
            )));
        }

        if self.serial.read_timeout_ms == 0 || self.serial.read_timeout_ms > 10000 {
            return Err(invalid("read_timeout_ms must be between 1 and 10000"));
        }

        if self.recorder.log_dir.is_empty() {
            return Err(invalid("recorder log_dir cannot be empty"));
        }

        if self.recorder.heartbeat_interval_ms == 0 || self.recorder.heartbeat_interval_ms > 60000 {
            return Err(invalid("heartbeat_interval_ms must be between 1 and 60000"));
        }

        if self.recorder.tail_bytes == 0 {
            return Err(invalid("tail_bytes must be greater than 0"));
        }

        if self.telemetry.poll_interval_ms == 0 || self.telemetry.poll_interval_ms > 10000 {
            return Err(invalid("poll_interval_ms must be between 1 and 10000"));
        }

        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> RoverBridgeError {
    RoverBridgeError::InvalidConfig(msg.into())
}
