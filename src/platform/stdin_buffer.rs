//! Stdin UTF-8 buffering.
//!
//! Terminal reads arrive in arbitrary chunks, so a multi-byte character can be split
//! across two reads. `StdinBuffer` decodes complete characters immediately and keeps an
//! incomplete tail until either the rest arrives or the flush deadline passes, at which
//! point the tail is emitted lossily instead of being held forever.

use std::time::{Duration, Instant};

const REPLACEMENT: char = '\u{fffd}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StdinBufferOptions {
    /// How long an incomplete UTF-8 tail may wait for its remaining bytes (milliseconds).
    pub timeout_ms: u64,
}

impl Default for StdinBufferOptions {
    fn default() -> Self {
        Self { timeout_ms: 10 }
    }
}

/// Incremental UTF-8 decoder for raw terminal input.
#[derive(Debug)]
pub struct StdinBuffer {
    pending: Vec<u8>,
    timeout_ms: u64,
    flush_deadline: Option<Instant>,
}

impl StdinBuffer {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            pending: Vec::new(),
            timeout_ms,
            flush_deadline: None,
        }
    }

    pub fn with_options(options: StdinBufferOptions) -> Self {
        Self::new(options.timeout_ms)
    }

    /// Decode `data` appended to any pending tail, returning every complete character.
    pub fn process(&mut self, data: &[u8]) -> Vec<char> {
        self.process_at(data, Instant::now())
    }

    pub fn process_at(&mut self, data: &[u8], now: Instant) -> Vec<char> {
        self.pending.extend_from_slice(data);
        let mut out = Vec::new();
        let mut rest: &[u8] = &self.pending;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.extend(valid.chars());
                    rest = &[];
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    if let Ok(valid) = std::str::from_utf8(valid) {
                        out.extend(valid.chars());
                    }
                    match err.error_len() {
                        Some(len) => {
                            out.push(REPLACEMENT);
                            rest = &after[len..];
                        }
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }

        let tail = rest.to_vec();
        self.pending = tail;
        self.flush_deadline = if self.pending.is_empty() {
            None
        } else {
            Some(now + Duration::from_millis(self.timeout_ms))
        };
        out
    }

    /// Emit the pending tail if its deadline has passed.
    pub fn flush_due(&mut self, now: Instant) -> Vec<char> {
        if self.pending.is_empty() {
            self.flush_deadline = None;
            return Vec::new();
        }
        match self.flush_deadline {
            Some(deadline) if now >= deadline => self.flush(),
            _ => Vec::new(),
        }
    }

    /// Poll timeout that wakes up in time for the flush deadline.
    pub fn next_timeout_ms(&self, now: Instant, default_ms: i32) -> i32 {
        if let Some(deadline) = self.flush_deadline {
            let remaining = deadline.saturating_duration_since(now);
            let ms = remaining.as_millis().min(i32::MAX as u128) as i32;
            return ms.min(default_ms).max(0);
        }
        default_ms
    }

    /// Emit the pending tail now, one replacement character per incomplete sequence.
    pub fn flush(&mut self) -> Vec<char> {
        self.flush_deadline = None;
        if self.pending.is_empty() {
            return Vec::new();
        }
        let chars = String::from_utf8_lossy(&self.pending).chars().collect();
        self.pending.clear();
        chars
    }

    pub fn clear(&mut self) {
        self.flush_deadline = None;
        self.pending.clear();
    }

    /// Bytes waiting for the rest of their character.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    pub fn has_deadline(&self) -> bool {
        self.flush_deadline.is_some()
    }
}
