//! Single command/response exchanges wrapped in command mode

use crate::core::types::{Mode, ResponseBuffer};
use crate::hardware::{CommResult, Transport};
use crate::protocol::command_mode::CommandModeController;
use crate::protocol::deadline::{CancelToken, Deadline};
use crate::protocol::error::{BleError, BleResult};
use crate::protocol::framer::Framer;
use crate::utils::config::DriverConfig;
use std::time::Duration;
use tracing::{debug, warn};

/// Reply to a dispatched command
///
/// The payload is kept even when leaving command mode afterwards failed;
/// that secondary failure is available through [`Reply::exit_error`].
#[derive(Debug)]
pub struct Reply {
    response: ResponseBuffer,
    exit_error: Option<BleError>,
}

impl Reply {
    pub fn response(&self) -> &ResponseBuffer {
        &self.response
    }

    pub fn bytes(&self) -> &[u8] {
        self.response.as_bytes()
    }

    pub fn contains(&self, marker: &str) -> bool {
        self.response.contains(marker)
    }

    pub fn exit_error(&self) -> Option<&BleError> {
        self.exit_error.as_ref()
    }

    pub fn exited_cleanly(&self) -> bool {
        self.exit_error.is_none()
    }

    pub fn into_response(self) -> ResponseBuffer {
        self.response
    }
}

/// Owns the framer and mode controller; one exchange at a time
pub struct CommandDispatcher<T: Transport> {
    framer: Framer<T>,
    controller: CommandModeController,
    command_timeout: Option<Duration>,
    cancel: CancelToken,
}

impl<T: Transport> CommandDispatcher<T> {
    pub fn new(transport: T, config: &DriverConfig) -> Self {
        Self {
            framer: Framer::from_config(transport, config),
            controller: CommandModeController::new(config.settle_delay()),
            command_timeout: config.command_timeout(),
            cancel: CancelToken::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.controller.mode()
    }

    /// Token that aborts any read this dispatcher is blocked in
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Deadline for one read phase of an ordinary command
    pub fn deadline(&self) -> Deadline {
        self.deadline_for(self.command_timeout)
    }

    pub fn deadline_for(&self, timeout: Option<Duration>) -> Deadline {
        Deadline::from_timeout(timeout).with_cancel(self.cancel.clone())
    }

    pub fn enter_command_mode(&mut self) -> BleResult<()> {
        let deadline = self.deadline();
        self.controller.enter(&mut self.framer, &deadline)
    }

    pub fn exit_command_mode(&mut self) -> BleResult<()> {
        let deadline = self.deadline();
        self.controller.exit(&mut self.framer, &deadline)
    }

    /// Write `command` verbatim; it must already carry its terminator
    pub fn send_raw(&mut self, command: &str) -> BleResult<()> {
        debug!(command = ?command, "Sending command");
        let deadline = self.deadline();
        self.framer.write_all(command.as_bytes(), &deadline)?;
        Ok(())
    }

    /// Enter command mode, send `command`, read `response_len` bytes, exit
    pub fn exec_fixed(&mut self, command: &str, response_len: usize) -> BleResult<Reply> {
        self.exec(command, |framer, deadline| {
            framer.read_exact(response_len, deadline)
        })
    }

    /// Enter command mode, send `command`, read up to `terminator`, exit
    pub fn exec_until(&mut self, command: &str, terminator: u8) -> BleResult<Reply> {
        self.exec(command, |framer, deadline| {
            framer.read_until(terminator, deadline)
        })
    }

    fn exec<F>(&mut self, command: &str, read: F) -> BleResult<Reply>
    where
        F: FnOnce(&mut Framer<T>, &Deadline) -> CommResult<ResponseBuffer>,
    {
        if let Err(err) = self.enter_command_mode() {
            warn!(command = ?command, error = %err, "Command not sent");
            return Err(err);
        }

        let response = match self.send_and_read(command, read) {
            Ok(response) => response,
            Err(err) => {
                // Still in command mode; try to leave it before reporting
                if let Err(exit_err) = self.exit_command_mode() {
                    warn!(error = %exit_err, "Exit after failed exchange also failed");
                }
                return Err(err);
            }
        };
        debug!(command = ?command, reply = %response.to_text(), "Command answered");

        let exit_error = match self.exit_command_mode() {
            Ok(()) => None,
            Err(err) => {
                warn!(command = ?command, error = %err, "Reply captured but exit failed");
                Some(err)
            }
        };

        Ok(Reply {
            response,
            exit_error,
        })
    }

    fn send_and_read<F>(&mut self, command: &str, read: F) -> BleResult<ResponseBuffer>
    where
        F: FnOnce(&mut Framer<T>, &Deadline) -> CommResult<ResponseBuffer>,
    {
        self.framer.flush()?;
        self.send_raw(command)?;
        let deadline = self.deadline();
        Ok(read(&mut self.framer, &deadline)?)
    }

    pub(crate) fn framer_mut(&mut self) -> &mut Framer<T> {
        &mut self.framer
    }

    pub(crate) fn controller_mut(&mut self) -> &mut CommandModeController {
        &mut self.controller
    }

    pub fn transport(&self) -> &T {
        self.framer.transport()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        self.framer.transport_mut()
    }

    pub fn into_transport(self) -> T {
        self.framer.into_inner()
    }
}
