//! Utility modules for configuration and logging

pub mod config;
pub mod logging;

pub use config::{BleConfig, ConfigError, DriverConfig, LogSettings};
pub use logging::init_logging;
