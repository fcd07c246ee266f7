//! Hardware abstraction layer for the serial link to the radio module
//!
//! The driver only needs three things from the link: push bytes, pull
//! whatever bytes are available, and read the module's connection-status
//! line. [`Transport`] captures that; [`SerialTransport`] is the real UART
//! and [`MockTransport`] a scripted stand-in for tests.

pub mod transport;
pub mod serial;
pub mod mock;
pub mod error;

pub use transport::Transport;
pub use serial::{LinkSignal, SerialSettings, SerialTransport};
pub use mock::MockTransport;
pub use error::{CommError, CommResult, RecoveryStrategy};
