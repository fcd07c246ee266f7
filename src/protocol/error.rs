//! Driver error taxonomy

use crate::core::types::LinkState;
use crate::hardware::{CommError, RecoveryStrategy};
use crate::utils::config::ConfigError;
use std::fmt;
use thiserror::Error;

/// Direction of a command-mode change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeTransition {
    Enter,
    Exit,
}

impl fmt::Display for ModeTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModeTransition::Enter => write!(f, "enter"),
            ModeTransition::Exit => write!(f, "exit"),
        }
    }
}

/// Failures reported by the driver's public operations
///
/// None of these are fatal: the module may be left in command mode or with
/// an unknown link, and the caller decides what to do next.
#[derive(Debug, Error)]
pub enum BleError {
    /// Entering or leaving command mode was not acknowledged
    #[error("failed to {transition} command mode (reply {reply:?})")]
    ModeTransitionFailed {
        transition: ModeTransition,
        reply: String,
    },
    /// A reply matched none of the markers expected for the operation
    #[error("unexpected reply to {operation}: {reply:?}")]
    ProtocolViolation {
        operation: &'static str,
        reply: String,
    },
    /// The module reported a connection-layer error
    #[error("connection rejected by module (reply {reply:?})")]
    ConnectionRejected { reply: String },
    /// Address of the wrong size or content
    #[error("invalid device address: {reason}")]
    InvalidAddress { reason: String },
    /// Payload transfer attempted without an established link
    #[error("no link established (state: {state})")]
    NotConnected { state: LinkState },
    /// The serial link or framer failed
    #[error(transparent)]
    Comm(#[from] CommError),
    /// Driver configuration rejected before opening the link
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for driver operations
pub type BleResult<T> = Result<T, BleError>;

impl BleError {
    pub(crate) fn protocol(operation: &'static str, reply: impl AsRef<[u8]>) -> Self {
        BleError::ProtocolViolation {
            operation,
            reply: String::from_utf8_lossy(reply.as_ref()).into_owned(),
        }
    }

    pub(crate) fn mode(transition: ModeTransition, reply: impl AsRef<[u8]>) -> Self {
        BleError::ModeTransitionFailed {
            transition,
            reply: String::from_utf8_lossy(reply.as_ref()).into_owned(),
        }
    }

    /// True for the bounded-read "gave up waiting" outcome
    pub fn is_timeout(&self) -> bool {
        matches!(self, BleError::Comm(CommError::Timeout { .. }))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, BleError::Comm(CommError::Cancelled { .. }))
    }

    /// Get the recommended recovery strategy for this error
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            BleError::ModeTransitionFailed { .. } => {
                RecoveryStrategy::RetryWithDelay { delay_ms: 100 }
            }
            BleError::ProtocolViolation { .. } => RecoveryStrategy::Retry,
            BleError::ConnectionRejected { .. } => {
                RecoveryStrategy::RetryWithDelay { delay_ms: 1000 }
            }
            BleError::InvalidAddress { .. } => RecoveryStrategy::Fail,
            BleError::NotConnected { .. } => RecoveryStrategy::Fail,
            BleError::Comm(err) => err.recovery_strategy(),
            BleError::Config(_) => RecoveryStrategy::Fail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_reply() {
        let err = BleError::mode(ModeTransition::Exit, b"ENDX");
        assert_eq!(err.to_string(), "failed to exit command mode (reply \"ENDX\")");

        let err = BleError::protocol("connect", b"%weird%");
        assert!(err.to_string().contains("connect"));
    }

    #[test]
    fn test_timeout_classification() {
        let err = BleError::from(CommError::Timeout {
            waited_ms: 10,
            received: Vec::new(),
        });
        assert!(err.is_timeout());
        assert!(!err.is_cancelled());
        assert_eq!(
            err.recovery_strategy(),
            RecoveryStrategy::RetryWithDelay { delay_ms: 100 }
        );
    }

    #[test]
    fn test_not_connected_is_final() {
        let err = BleError::NotConnected {
            state: LinkState::Disconnected,
        };
        assert_eq!(err.recovery_strategy(), RecoveryStrategy::Fail);
        assert_eq!(err.to_string(), "no link established (state: disconnected)");
    }
}
