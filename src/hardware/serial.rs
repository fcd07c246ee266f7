//! Serial/UART transport backed by the `serialport` crate

use crate::core::constants::DEFAULT_BAUD_RATE;
use crate::hardware::{CommError, CommResult, Transport};
use serde::{Deserialize, Serialize};
use serialport::{ClearBuffer, SerialPort};
use std::io::{self, Read, Write};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Modem-status line wired to the module's connection-status output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LinkSignal {
    /// DCD, the usual choice for USB-UART bridges with a status input
    #[default]
    CarrierDetect,
    DataSetReady,
    ClearToSend,
    RingIndicator,
    /// No status line wired; the link is always reported absent
    None,
}

/// Serial port parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// OS name of the port (`/dev/ttyUSB0`, `COM3`, ...)
    pub port_name: String,
    pub baud_rate: u32,
    /// Port-level timeout for a single poll, kept short so `recv` stays non-blocking
    pub read_timeout_ms: u64,
    pub link_signal: LinkSignal,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port_name: "/dev/ttyUSB0".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: 10,
            link_signal: LinkSignal::default(),
        }
    }
}

impl SerialSettings {
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> CommResult<()> {
        if self.port_name.trim().is_empty() {
            return Err(CommError::ConfigurationError {
                parameter: "port_name".to_string(),
                value: format!("{:?}", self.port_name),
            });
        }
        if self.baud_rate == 0 {
            return Err(CommError::ConfigurationError {
                parameter: "baud_rate".to_string(),
                value: self.baud_rate.to_string(),
            });
        }
        Ok(())
    }
}

/// UART connection to one radio module
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    port_name: String,
    link_signal: LinkSignal,
}

impl SerialTransport {
    /// Open the port described by `settings`
    pub fn open(settings: &SerialSettings) -> CommResult<Self> {
        settings.validate()?;

        let port = serialport::new(&settings.port_name, settings.baud_rate)
            .timeout(Duration::from_millis(settings.read_timeout_ms))
            .open()?;

        info!(
            port = %settings.port_name,
            baud = settings.baud_rate,
            "Opened serial port"
        );

        Ok(Self {
            port,
            port_name: settings.port_name.clone(),
            link_signal: settings.link_signal,
        })
    }

    /// Wrap an already opened port
    pub fn from_port(port: Box<dyn SerialPort>, link_signal: LinkSignal) -> Self {
        let port_name = port.name().unwrap_or_default();
        Self {
            port,
            port_name,
            link_signal,
        }
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Drop everything queued in the OS buffers, both directions
    pub fn discard_buffers(&mut self) -> CommResult<()> {
        self.port.clear(ClearBuffer::All)?;
        Ok(())
    }

    fn read_link_signal(&mut self) -> serialport::Result<bool> {
        match self.link_signal {
            LinkSignal::CarrierDetect => self.port.read_carrier_detect(),
            LinkSignal::DataSetReady => self.port.read_data_set_ready(),
            LinkSignal::ClearToSend => self.port.read_clear_to_send(),
            LinkSignal::RingIndicator => self.port.read_ring_indicator(),
            LinkSignal::None => Ok(false),
        }
    }
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

impl Transport for SerialTransport {
    fn send(&mut self, data: &[u8]) -> CommResult<usize> {
        match self.port.write(data) {
            Ok(n) => Ok(n),
            Err(e) if is_transient(&e) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn recv(&mut self, buf: &mut [u8]) -> CommResult<usize> {
        let available = self.port.bytes_to_read()? as usize;
        if available == 0 || buf.is_empty() {
            return Ok(0);
        }

        let len = available.min(buf.len());
        match self.port.read(&mut buf[..len]) {
            Ok(n) => Ok(n),
            Err(e) if is_transient(&e) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn is_link_present(&mut self) -> bool {
        match self.read_link_signal() {
            Ok(present) => present,
            Err(e) => {
                warn!(port = %self.port_name, error = %e, "Could not read link status line");
                false
            }
        }
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        debug!(port = %self.port_name, "Closing serial port");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = SerialSettings::default();
        assert_eq!(settings.baud_rate, 115_200);
        assert_eq!(settings.link_signal, LinkSignal::CarrierDetect);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_invalid_settings() {
        let settings = SerialSettings::new("/dev/ttyUSB1", 0);
        assert!(matches!(
            settings.validate(),
            Err(CommError::ConfigurationError { .. })
        ));

        let settings = SerialSettings::new("  ", 9600);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_open_rejects_invalid_settings_before_touching_the_port() {
        let settings = SerialSettings::new("", 115_200);
        assert!(matches!(
            SerialTransport::open(&settings),
            Err(CommError::ConfigurationError { .. })
        ));
    }

    #[test]
    fn test_transient_io_errors() {
        assert!(is_transient(&io::Error::from(io::ErrorKind::TimedOut)));
        assert!(!is_transient(&io::Error::from(io::ErrorKind::BrokenPipe)));
    }
}
