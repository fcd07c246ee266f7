//! Communication error types and handling

use thiserror::Error;

/// Failures of the serial link or of the framer reading from it
#[derive(Debug, Error)]
pub enum CommError {
    /// The serial port driver reported an error
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
    /// I/O error while reading or writing the port
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// The read deadline passed before the reply was complete
    #[error("timed out after {waited_ms}ms with {} reply bytes", .received.len())]
    Timeout { waited_ms: u64, received: Vec<u8> },
    /// The read was cancelled through its cancel token
    #[error("read cancelled with {} reply bytes", .received.len())]
    Cancelled { received: Vec<u8> },
    /// A delimiter-terminated reply did not fit the response buffer
    #[error("reply exceeded {capacity} bytes without a terminator")]
    BufferOverflow { capacity: usize },
    /// The transport stopped accepting bytes before the deadline
    #[error("write stalled after {written} of {total} bytes")]
    WriteStalled { written: usize, total: usize },
    /// Invalid transport configuration
    #[error("configuration error: invalid {parameter} = {value}")]
    ConfigurationError { parameter: String, value: String },
}

/// Result type for communication operations
pub type CommResult<T> = Result<T, CommError>;

/// Suggested caller reaction to a communication failure
///
/// The driver never acts on this itself; retry policy belongs to the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecoveryStrategy {
    /// Retry the operation immediately
    Retry,
    /// Wait and then retry
    RetryWithDelay { delay_ms: u32 },
    /// Reopen the port and retry
    ResetAndRetry,
    /// Fail permanently
    Fail,
}

impl CommError {
    /// Get the recommended recovery strategy for this error
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            CommError::Serial(_) => RecoveryStrategy::ResetAndRetry,
            CommError::Io(_) => RecoveryStrategy::ResetAndRetry,
            CommError::Timeout { .. } => RecoveryStrategy::RetryWithDelay { delay_ms: 100 },
            CommError::Cancelled { .. } => RecoveryStrategy::Fail,
            CommError::BufferOverflow { .. } => RecoveryStrategy::Retry,
            CommError::WriteStalled { .. } => RecoveryStrategy::ResetAndRetry,
            CommError::ConfigurationError { .. } => RecoveryStrategy::Fail,
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        !matches!(self.recovery_strategy(), RecoveryStrategy::Fail)
    }

    /// Bytes that had arrived before a timeout or cancellation
    pub fn partial_reply(&self) -> Option<&[u8]> {
        match self {
            CommError::Timeout { received, .. } | CommError::Cancelled { received } => {
                Some(received.as_slice())
            }
            _ => None,
        }
    }
}
