//! Command-mode protocol layers
//!
//! Bytes flow one way through this stack: the [`CommandDispatcher`] drives
//! the [`CommandModeController`] and the [`Framer`], and only the framer
//! touches the transport.

pub mod deadline;
pub mod framer;
pub mod command_mode;
pub mod dispatcher;
pub mod error;

pub use deadline::{CancelToken, Deadline};
pub use framer::Framer;
pub use command_mode::CommandModeController;
pub use dispatcher::{CommandDispatcher, Reply};
pub use error::{BleError, BleResult, ModeTransition};
