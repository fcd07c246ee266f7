//! Core data types shared by the protocol and link layers

use crate::core::constants::DEVICE_ADDRESS_LEN;
use crate::protocol::error::{BleError, BleResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which language the module is currently listening in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    /// Transparent payload bytes (power-up state)
    #[default]
    Data,
    /// Text configuration commands
    Command,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Data => write!(f, "data"),
            Mode::Command => write!(f, "command"),
        }
    }
}

/// State of the radio link to a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LinkState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// The module rejected the last connection attempt
    ConnectionError,
}

impl LinkState {
    pub fn is_connected(&self) -> bool {
        matches!(self, LinkState::Connected)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Disconnected => write!(f, "disconnected"),
            LinkState::Connecting => write!(f, "connecting"),
            LinkState::Connected => write!(f, "connected"),
            LinkState::ConnectionError => write!(f, "connection error"),
        }
    }
}

/// A module address as the module prints it: 12 ASCII characters
///
/// The length is enforced on construction so a connect command built from
/// it always has its fixed size. Content is not restricted to hex digits,
/// since [`crate::BleLink::get_address`] copies whatever the module sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceAddress([u8; DEVICE_ADDRESS_LEN]);

impl DeviceAddress {
    pub const fn from_raw(bytes: [u8; DEVICE_ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DEVICE_ADDRESS_LEN] {
        &self.0
    }

    /// True when every character is an ASCII hex digit
    pub fn is_hex(&self) -> bool {
        self.0.iter().all(u8::is_ascii_hexdigit)
    }
}

impl TryFrom<&[u8]> for DeviceAddress {
    type Error = BleError;

    fn try_from(bytes: &[u8]) -> BleResult<Self> {
        let raw: [u8; DEVICE_ADDRESS_LEN] =
            bytes.try_into().map_err(|_| BleError::InvalidAddress {
                reason: format!(
                    "expected {} bytes, got {}",
                    DEVICE_ADDRESS_LEN,
                    bytes.len()
                ),
            })?;
        Ok(Self(raw))
    }
}

impl FromStr for DeviceAddress {
    type Err = BleError;

    /// Parses a textual address, requiring 12 hex digits
    fn from_str(s: &str) -> BleResult<Self> {
        let address = Self::try_from(s.as_bytes())?;
        if !address.is_hex() {
            return Err(BleError::InvalidAddress {
                reason: format!("'{}' is not hexadecimal", s),
            });
        }
        Ok(address)
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// Bytes captured from one reply, filled left to right by the framer
///
/// Always starts empty; the logical length is whatever the read produced
/// (a fixed count, or everything before the terminator).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseBuffer {
    data: Vec<u8>,
}

impl ResponseBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, byte: u8) {
        self.data.push(byte);
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Substring containment, anywhere in the captured bytes
    pub fn contains(&self, marker: &str) -> bool {
        contains_marker(&self.data, marker)
    }

    /// Exact match of the whole capture
    pub fn matches(&self, text: &str) -> bool {
        self.data == text.as_bytes()
    }

    /// Lossy text rendering for logs and error context
    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

impl From<Vec<u8>> for ResponseBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl AsRef<[u8]> for ResponseBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

/// Byte-level `strstr`
pub fn contains_marker(haystack: &[u8], marker: &str) -> bool {
    let needle = marker.as_bytes();
    if needle.is_empty() {
        return true;
    }
    haystack.windows(needle.len()).any(|window| window == needle)
}
