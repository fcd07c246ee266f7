//! PmodBLE radio module driver
//!
//! Drives a serial-attached Bluetooth LE module through its text command
//! protocol: enter command mode with `$$$`, issue a command, read the
//! reply, leave with `---`. On top of that sit address query, connection
//! management and raw payload transfer in data mode.
//!
//! Every read is bounded by a [`Deadline`] and can be aborted from another
//! thread through a [`CancelToken`].

pub mod core;
pub mod hardware;
pub mod protocol;
pub mod link;
pub mod utils;

// Re-export commonly used types
pub use crate::core::{DeviceAddress, LinkState, Mode, ResponseBuffer};
pub use hardware::{
    CommError, CommResult, LinkSignal, MockTransport, RecoveryStrategy, SerialSettings,
    SerialTransport, Transport,
};
pub use protocol::{
    BleError, BleResult, CancelToken, CommandDispatcher, Deadline, ModeTransition, Reply,
};
pub use link::{BleLink, ConnectOutcome};
pub use utils::{init_logging, BleConfig, ConfigError, DriverConfig, LogSettings};
