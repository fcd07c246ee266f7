use crate::core::constants::{
    DEFAULT_FLUSH_CAPACITY, DEFAULT_MAX_RESPONSE_LEN, DEFAULT_SETTLE_DELAY_MS,
};
use crate::hardware::{CommError, SerialSettings};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Upper bound for any single buffer the driver allocates
const MAX_BUFFER_LEN: usize = 4096;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid parameter value
    #[error("invalid {parameter} = {value}: {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },
    /// Configuration file I/O error
    #[error("{message}")]
    Io { message: String },
    /// JSON serialization/deserialization error
    #[error("{message}")]
    Serialization { message: String },
}

/// Protocol timing and buffer limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Quiet time before the command-mode escape (milliseconds)
    pub settle_delay_ms: u64,
    /// Bound on each read phase of a command exchange; `None` waits forever
    pub command_timeout_ms: Option<u64>,
    /// Bound on each read phase of a connection attempt; `None` waits forever
    pub connect_timeout_ms: Option<u64>,
    /// Sleep between empty polls (microseconds); 0 yields instead
    pub poll_interval_us: u64,
    /// Bytes discarded by one flush
    pub flush_capacity: usize,
    /// Largest delimiter-terminated reply accepted
    pub max_response_len: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            command_timeout_ms: Some(1000),
            connect_timeout_ms: Some(10_000),
            poll_interval_us: 100,
            flush_capacity: DEFAULT_FLUSH_CAPACITY,
            max_response_len: DEFAULT_MAX_RESPONSE_LEN,
        }
    }
}

impl DriverConfig {
    /// Settings for a scripted transport: no settle delay, short timeouts
    pub fn mock() -> Self {
        Self {
            settle_delay_ms: 0,
            command_timeout_ms: Some(50),
            connect_timeout_ms: Some(50),
            poll_interval_us: 0,
            ..Default::default()
        }
    }

    /// Reads block until the module answers, as the bare protocol does
    pub fn unbounded() -> Self {
        Self {
            command_timeout_ms: None,
            connect_timeout_ms: None,
            ..Default::default()
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_ms.map(Duration::from_millis)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.poll_interval_us)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (parameter, timeout) in [
            ("command_timeout_ms", self.command_timeout_ms),
            ("connect_timeout_ms", self.connect_timeout_ms),
        ] {
            if timeout == Some(0) {
                return Err(ConfigError::InvalidParameter {
                    parameter: parameter.to_string(),
                    value: "0".to_string(),
                    reason: "use null to wait without a bound".to_string(),
                });
            }
        }

        for (parameter, len) in [
            ("flush_capacity", self.flush_capacity),
            ("max_response_len", self.max_response_len),
        ] {
            if len == 0 || len > MAX_BUFFER_LEN {
                return Err(ConfigError::InvalidParameter {
                    parameter: parameter.to_string(),
                    value: len.to_string(),
                    reason: format!("must be between 1 and {}", MAX_BUFFER_LEN),
                });
            }
        }

        Ok(())
    }
}

/// Console logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
    pub show_target: bool,
    pub show_file_line: bool,
    pub ansi_colors: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            show_target: true,
            show_file_line: false,
            ansi_colors: true,
        }
    }
}

/// Everything needed to bring up one module
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BleConfig {
    pub serial: SerialSettings,
    pub driver: DriverConfig,
    pub logging: LogSettings,
}

impl BleConfig {
    /// Load and validate a JSON configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.load_from_file(path)?;
        Ok(config)
    }

    /// Replace this configuration with the contents of a JSON file
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::Io {
            message: format!("Failed to read config file '{}': {}", path_str, e),
        })?;

        let config: BleConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::Serialization {
                message: format!("Failed to parse config file '{}': {}", path_str, e),
            })?;

        // Validate before applying
        config.validate()?;
        *self = config;
        Ok(())
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialization {
                message: format!("Failed to serialize config: {}", e),
            })?;

        fs::write(&path, content).map_err(|e| ConfigError::Io {
            message: format!("Failed to write config file '{}': {}", path_str, e),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.serial.validate().map_err(|e| match e {
            CommError::ConfigurationError { parameter, value } => ConfigError::InvalidParameter {
                parameter,
                value,
                reason: "rejected by serial settings".to_string(),
            },
            other => ConfigError::InvalidParameter {
                parameter: "serial".to_string(),
                value: String::new(),
                reason: other.to_string(),
            },
        })?;
        self.driver.validate()
    }
}
