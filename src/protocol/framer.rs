//! Byte-level reply framing on top of a [`Transport`]

use crate::core::constants::{DEFAULT_FLUSH_CAPACITY, DEFAULT_MAX_RESPONSE_LEN};
use crate::core::types::ResponseBuffer;
use crate::hardware::{CommError, CommResult, Transport};
use crate::protocol::deadline::Deadline;
use crate::utils::config::DriverConfig;
use std::time::Duration;
use tracing::trace;

/// Reads fixed-length and terminator-delimited replies, one byte at a time
pub struct Framer<T: Transport> {
    transport: T,
    flush_capacity: usize,
    max_response_len: usize,
    poll_interval: Duration,
}

impl<T: Transport> Framer<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            flush_capacity: DEFAULT_FLUSH_CAPACITY,
            max_response_len: DEFAULT_MAX_RESPONSE_LEN,
            poll_interval: Duration::ZERO,
        }
    }

    pub fn from_config(transport: T, config: &DriverConfig) -> Self {
        Self {
            transport,
            flush_capacity: config.flush_capacity,
            max_response_len: config.max_response_len,
            poll_interval: config.poll_interval(),
        }
    }

    /// Block until exactly `count` bytes have been read
    pub fn read_exact(&mut self, count: usize, deadline: &Deadline) -> CommResult<ResponseBuffer> {
        let mut response = ResponseBuffer::with_capacity(count);

        while response.len() < count {
            match self.read_byte()? {
                Some(byte) => {
                    trace!(byte, ch = %char::from(byte).escape_default(), "read");
                    response.push(byte);
                }
                None => self.idle(deadline, &response)?,
            }
        }

        Ok(response)
    }

    /// Block until `terminator` is read; the terminator is consumed but not returned
    ///
    /// Bytes after the terminator stay in the transport for the next read.
    pub fn read_until(&mut self, terminator: u8, deadline: &Deadline) -> CommResult<ResponseBuffer> {
        let mut response = ResponseBuffer::with_capacity(self.max_response_len);

        loop {
            match self.read_byte()? {
                Some(byte) if byte == terminator => return Ok(response),
                Some(byte) => {
                    if response.len() >= self.max_response_len {
                        return Err(CommError::BufferOverflow {
                            capacity: self.max_response_len,
                        });
                    }
                    trace!(byte, ch = %char::from(byte).escape_default(), "read");
                    response.push(byte);
                }
                None => self.idle(deadline, &response)?,
            }
        }
    }

    /// Discard stale input with one bounded, non-blocking read
    pub fn flush(&mut self) -> CommResult<usize> {
        let mut scratch = vec![0u8; self.flush_capacity];
        let discarded = self.transport.recv(&mut scratch)?;
        trace!(discarded, "flushed receive buffer");
        Ok(discarded)
    }

    /// Offer `data` one byte at a time until every byte is accepted
    pub fn write_all(&mut self, data: &[u8], deadline: &Deadline) -> CommResult<()> {
        let mut written = 0;

        while written < data.len() {
            if self.transport.send(&data[written..=written])? == 1 {
                written += 1;
                continue;
            }
            deadline.check(&[]).map_err(|err| match err {
                CommError::Timeout { .. } => CommError::WriteStalled {
                    written,
                    total: data.len(),
                },
                other => other,
            })?;
            self.pause();
        }

        Ok(())
    }

    /// Single read attempt straight from the transport
    pub fn recv(&mut self, buf: &mut [u8]) -> CommResult<usize> {
        self.transport.recv(buf)
    }

    pub fn is_link_present(&mut self) -> bool {
        self.transport.is_link_present()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    fn read_byte(&mut self) -> CommResult<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.transport.recv(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    fn idle(&self, deadline: &Deadline, received: &ResponseBuffer) -> CommResult<()> {
        deadline.check(received.as_bytes())?;
        self.pause();
        Ok(())
    }

    fn pause(&self) {
        if self.poll_interval.is_zero() {
            std::thread::yield_now();
        } else {
            std::thread::sleep(self.poll_interval);
        }
    }
}
