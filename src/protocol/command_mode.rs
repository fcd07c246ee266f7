//! Entering and leaving the module's command mode

use crate::core::constants::{
    COMMAND_TERMINATOR, ENTER_CMD_MODE_CMD, ENTER_CMD_MODE_ENABLED_RESPONSE,
    ENTER_CMD_MODE_RESPONSE_LEN, EXIT_CMD_MODE_CMD, EXIT_CMD_MODE_RESPONSE,
};
use crate::core::types::Mode;
use crate::hardware::Transport;
use crate::protocol::deadline::Deadline;
use crate::protocol::error::{BleError, BleResult, ModeTransition};
use crate::protocol::framer::Framer;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Tracks which mode the module was last told to be in
///
/// The two acknowledgments are checked differently on purpose. The enter
/// reply is not line terminated, so a fixed 4-byte capture is searched for
/// `CMD>`; the exit reply is a normal `\r`-terminated line that must read
/// exactly `END`.
#[derive(Debug, Clone)]
pub struct CommandModeController {
    mode: Mode,
    settle_delay: Duration,
}

impl CommandModeController {
    pub fn new(settle_delay: Duration) -> Self {
        Self {
            mode: Mode::Data,
            settle_delay,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Record a mode change the module made on its own
    pub(crate) fn set_mode(&mut self, mode: Mode) {
        if self.mode != mode {
            debug!(from = %self.mode, to = %mode, "Mode changed by module");
        }
        self.mode = mode;
    }

    /// Send the escape sequence and confirm the module switched to command mode
    ///
    /// On failure the recorded mode stays `Data`.
    pub fn enter<T: Transport>(
        &mut self,
        framer: &mut Framer<T>,
        deadline: &Deadline,
    ) -> BleResult<()> {
        if self.mode == Mode::Command {
            debug!("Entering command mode while already recorded as in it");
        }

        // The module only honours the escape after a quiet period
        if !self.settle_delay.is_zero() {
            std::thread::sleep(self.settle_delay);
        }

        framer.flush()?;
        framer.write_all(ENTER_CMD_MODE_CMD.as_bytes(), deadline)?;
        let reply = framer.read_exact(ENTER_CMD_MODE_RESPONSE_LEN, deadline)?;

        if reply.contains(ENTER_CMD_MODE_ENABLED_RESPONSE) {
            info!("Command mode enabled");
            self.mode = Mode::Command;
            Ok(())
        } else {
            warn!(reply = %reply.to_text(), "Command mode not acknowledged");
            Err(BleError::mode(ModeTransition::Enter, reply))
        }
    }

    /// Send the exit sequence and confirm the module returned to data mode
    pub fn exit<T: Transport>(
        &mut self,
        framer: &mut Framer<T>,
        deadline: &Deadline,
    ) -> BleResult<()> {
        framer.flush()?;
        framer.write_all(EXIT_CMD_MODE_CMD.as_bytes(), deadline)?;
        let reply = framer.read_until(COMMAND_TERMINATOR, deadline)?;

        if reply.matches(EXIT_CMD_MODE_RESPONSE) {
            info!("Exited command mode");
            self.mode = Mode::Data;
            Ok(())
        } else {
            warn!(reply = %reply.to_text(), "Command mode exit not acknowledged");
            Err(BleError::mode(ModeTransition::Exit, reply))
        }
    }
}

impl Default for CommandModeController {
    fn default() -> Self {
        Self::new(Duration::from_millis(crate::core::constants::DEFAULT_SETTLE_DELAY_MS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::MockTransport;

    fn framer_replying(trigger: &str, reply: &[u8]) -> Framer<MockTransport> {
        let mut mock = MockTransport::new();
        mock.expect(trigger, reply);
        Framer::new(mock)
    }

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_millis(50))
    }

    fn try_enter(reply: &[u8]) -> (BleResult<()>, Mode) {
        let mut framer = framer_replying("$$$", reply);
        let mut controller = CommandModeController::new(Duration::ZERO);
        let result = controller.enter(&mut framer, &deadline());
        (result, controller.mode())
    }

    #[test]
    fn test_enter_success() {
        let (result, mode) = try_enter(b"CMD>");
        assert!(result.is_ok());
        assert_eq!(mode, Mode::Command);
    }

    #[test]
    fn test_enter_requires_prompt_marker() {
        // "CMD" alone means command mode without command access
        for reply in [&b"CMDX"[..], b"XCMD", b"CMD\r", b"ERR\r"] {
            let (result, mode) = try_enter(reply);
            assert!(
                matches!(
                    result,
                    Err(BleError::ModeTransitionFailed {
                        transition: ModeTransition::Enter,
                        ..
                    })
                ),
                "reply {:?} should be rejected",
                reply
            );
            assert_eq!(mode, Mode::Data);
        }
    }

    #[test]
    fn test_enter_sends_escape_without_terminator() {
        let mut framer = framer_replying("$$$", b"CMD>");
        let mut controller = CommandModeController::new(Duration::ZERO);
        controller.enter(&mut framer, &deadline()).unwrap();
        assert_eq!(framer.transport().sent(), b"$$$");
    }

    #[test]
    fn test_enter_discards_stale_input() {
        let mut mock = MockTransport::new();
        mock.inject(b"%STALE%");
        mock.expect_enter();
        let mut framer = Framer::new(mock);
        let mut controller = CommandModeController::new(Duration::ZERO);

        assert!(controller.enter(&mut framer, &deadline()).is_ok());
    }

    #[test]
    fn test_enter_timeout_leaves_data_mode() {
        let mut framer = Framer::new(MockTransport::new());
        let mut controller = CommandModeController::new(Duration::ZERO);

        let err = controller.enter(&mut framer, &deadline()).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(controller.mode(), Mode::Data);
    }

    #[test]
    fn test_exit_exact_match() {
        let mut framer = framer_replying("---\r", b"END\r");
        let mut controller = CommandModeController::new(Duration::ZERO);
        controller.set_mode(Mode::Command);

        assert!(controller.exit(&mut framer, &deadline()).is_ok());
        assert_eq!(controller.mode(), Mode::Data);
        assert_eq!(framer.transport().sent(), b"---\r");
    }

    #[test]
    fn test_exit_rejects_trailing_garbage() {
        let mut framer = framer_replying("---\r", b"ENDX\r");
        let mut controller = CommandModeController::new(Duration::ZERO);
        controller.set_mode(Mode::Command);

        let err = controller.exit(&mut framer, &deadline()).unwrap_err();
        assert!(matches!(
            err,
            BleError::ModeTransitionFailed {
                transition: ModeTransition::Exit,
                ..
            }
        ));
        assert_eq!(controller.mode(), Mode::Command);
    }
}
