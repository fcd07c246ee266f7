//! Scripted mock transport for testing and development

use crate::core::constants::{
    ENTER_CMD_MODE_CMD, ENTER_CMD_MODE_ENABLED_RESPONSE, EXIT_CMD_MODE_CMD,
    EXIT_CMD_MODE_RESPONSE,
};
use crate::hardware::{CommResult, Transport};
use std::collections::VecDeque;

/// One scripted exchange: once the bytes written since the previous
/// exchange end with `trigger`, `reply` becomes readable.
#[derive(Debug, Clone)]
struct ScriptedReply {
    trigger: Vec<u8>,
    reply: Vec<u8>,
}

/// Simulated radio module on the far side of a serial link
///
/// Replies are scripted in order. Bytes only become readable after the
/// command that provokes them has been written, so a flush issued before
/// the command cannot swallow its reply.
#[derive(Debug, Default)]
pub struct MockTransport {
    rx: VecDeque<u8>,
    script: VecDeque<ScriptedReply>,
    pending: Vec<u8>,
    sent: Vec<u8>,
    link_present: bool,
    refused_sends: usize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply to be released once `trigger` has been written
    pub fn expect(&mut self, trigger: impl AsRef<[u8]>, reply: impl AsRef<[u8]>) -> &mut Self {
        self.script.push_back(ScriptedReply {
            trigger: trigger.as_ref().to_vec(),
            reply: reply.as_ref().to_vec(),
        });
        self
    }

    /// Script a successful command-mode entry
    pub fn expect_enter(&mut self) -> &mut Self {
        self.expect(ENTER_CMD_MODE_CMD, ENTER_CMD_MODE_ENABLED_RESPONSE)
    }

    /// Script a successful command-mode exit
    pub fn expect_exit(&mut self) -> &mut Self {
        let reply = format!("{}\r", EXIT_CMD_MODE_RESPONSE);
        self.expect(EXIT_CMD_MODE_CMD, reply)
    }

    /// Make bytes readable right away, as if the module sent them unprompted
    pub fn inject(&mut self, data: impl AsRef<[u8]>) {
        self.rx.extend(data.as_ref());
    }

    pub fn set_link_present(&mut self, present: bool) {
        self.link_present = present;
    }

    /// Refuse the next `count` send calls (accepting zero bytes)
    pub fn refuse_next_sends(&mut self, count: usize) {
        self.refused_sends = count;
    }

    /// Everything written so far, in order
    pub fn sent(&self) -> &[u8] {
        &self.sent
    }

    pub fn sent_text(&self) -> String {
        String::from_utf8_lossy(&self.sent).into_owned()
    }

    /// Number of non-overlapping occurrences of `pattern` in the sent bytes
    pub fn sent_count(&self, pattern: impl AsRef<[u8]>) -> usize {
        let pattern = pattern.as_ref();
        if pattern.is_empty() {
            return 0;
        }
        let mut count = 0;
        let mut idx = 0;
        while idx + pattern.len() <= self.sent.len() {
            if &self.sent[idx..idx + pattern.len()] == pattern {
                count += 1;
                idx += pattern.len();
            } else {
                idx += 1;
            }
        }
        count
    }

    pub fn clear_sent(&mut self) {
        self.sent.clear();
    }

    /// Scripted replies not yet triggered
    pub fn remaining_script(&self) -> usize {
        self.script.len()
    }

    /// Bytes readable but not yet read
    pub fn unread(&self) -> usize {
        self.rx.len()
    }

    fn accept(&mut self, byte: u8) {
        self.sent.push(byte);
        self.pending.push(byte);

        let fired = match self.script.front() {
            Some(next) => self.pending.ends_with(&next.trigger),
            None => false,
        };
        if fired {
            if let Some(next) = self.script.pop_front() {
                self.rx.extend(next.reply);
            }
            self.pending.clear();
        }
    }
}

impl Transport for MockTransport {
    fn send(&mut self, data: &[u8]) -> CommResult<usize> {
        if self.refused_sends > 0 {
            self.refused_sends -= 1;
            return Ok(0);
        }
        for &byte in data {
            self.accept(byte);
        }
        Ok(data.len())
    }

    fn recv(&mut self, buf: &mut [u8]) -> CommResult<usize> {
        let count = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }

    fn is_link_present(&mut self) -> bool {
        self.link_present
    }
}
