//! Bounds and cancellation for blocking framer reads

use crate::hardware::{CommError, CommResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared flag that aborts pending reads from another thread
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Re-arm the token after a cancellation has been handled
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// When a blocking read must give up
///
/// [`Deadline::none`] waits forever, like the bare module protocol does;
/// a cancel token can still abort it.
#[derive(Debug, Clone)]
pub struct Deadline {
    started: Instant,
    at: Option<Instant>,
    cancel: Option<CancelToken>,
}

impl Deadline {
    /// No time bound
    pub fn none() -> Self {
        Self {
            started: Instant::now(),
            at: None,
            cancel: None,
        }
    }

    /// Expire `timeout` from now
    pub fn after(timeout: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            at: Some(started + timeout),
            cancel: None,
        }
    }

    pub fn from_timeout(timeout: Option<Duration>) -> Self {
        match timeout {
            Some(timeout) => Self::after(timeout),
            None => Self::none(),
        }
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn is_bounded(&self) -> bool {
        self.at.is_some()
    }

    pub fn is_expired(&self) -> bool {
        self.at.map_or(false, |at| Instant::now() >= at)
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Fail with `Cancelled` or `Timeout` if the wait must stop
    ///
    /// `received` is whatever the caller has accumulated, carried in the
    /// error so the partial reply is not lost.
    pub fn check(&self, received: &[u8]) -> CommResult<()> {
        if self.cancel.as_ref().map_or(false, CancelToken::is_cancelled) {
            return Err(CommError::Cancelled {
                received: received.to_vec(),
            });
        }
        if self.is_expired() {
            return Err(CommError::Timeout {
                waited_ms: self.started.elapsed().as_millis() as u64,
                received: received.to_vec(),
            });
        }
        Ok(())
    }
}
