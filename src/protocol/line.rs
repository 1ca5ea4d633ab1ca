//! Receive-side line framing.
//!
//! Bytes from the host link are accumulated until CR, LF or CRLF.  The
//! collector is a small state machine in the same spirit as a streaming
//! frame decoder: it can be fed any split of the input and yields complete
//! lines as they finish.
//!
//! ```text
//!   "SET" "TIME epoch=1\r" "\nSTATUS\n"
//!          │                   │
//!          ▼                   ▼
//!   ["SETTIME epoch=1"]   ["STATUS"]      (the LF after CR is swallowed)
//! ```
//!
//! Rules:
//! - CR ends a line and arms a one-shot flag so an LF right after it is
//!   swallowed; any other byte clears the flag.
//! - Trailing spaces and tabs are trimmed; an empty result is dropped.
//! - A line that would not fit the buffer is discarded whole, up to and
//!   including its terminator.

use log::warn;

use crate::config::LINE_CAPACITY;

/// One completed line, terminator and trailing blanks removed.
pub type Line = heapless::Vec<u8, LINE_CAPACITY>;

/// Longest line delivered; one slot of the buffer is reserved.
pub const MAX_LINE_LEN: usize = LINE_CAPACITY - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CollectorState {
    /// Accumulating bytes of a line.
    Collecting,
    /// Current line overflowed; drop bytes until a terminator.
    Discarding,
}

/// Streaming CR/LF line collector.
pub struct LineCollector {
    state: CollectorState,
    buf: Line,
    cr_pending: bool,
}

impl Default for LineCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl LineCollector {
    pub fn new() -> Self {
        Self {
            state: CollectorState::Collecting,
            buf: Line::new(),
            cr_pending: false,
        }
    }

    /// Feed one byte.  Returns a line when `byte` completes one.
    pub fn push(&mut self, byte: u8) -> Option<Line> {
        match byte {
            b'\r' => {
                self.cr_pending = true;
                self.finish()
            }
            b'\n' if self.cr_pending => {
                self.cr_pending = false;
                None
            }
            b'\n' => self.finish(),
            _ => {
                self.cr_pending = false;
                if self.state == CollectorState::Collecting
                    && (self.buf.len() >= MAX_LINE_LEN || self.buf.push(byte).is_err())
                {
                    warn!("Line collector: overflow, discarding line");
                    self.buf.clear();
                    self.state = CollectorState::Discarding;
                }
                None
            }
        }
    }

    /// Feed a slice, calling `on_line` for each completed line in order.
    pub fn feed(&mut self, data: &[u8], mut on_line: impl FnMut(Line)) {
        for &b in data {
            if let Some(line) = self.push(b) {
                on_line(line);
            }
        }
    }

    /// Drop any partial line (e.g. when the link is reopened).
    pub fn reset(&mut self) {
        self.state = CollectorState::Collecting;
        self.buf.clear();
        self.cr_pending = false;
    }

    fn finish(&mut self) -> Option<Line> {
        if self.state == CollectorState::Discarding {
            self.state = CollectorState::Collecting;
            self.buf.clear();
            return None;
        }
        while matches!(self.buf.last(), Some(b' ' | b'\t')) {
            self.buf.pop();
        }
        if self.buf.is_empty() {
            return None;
        }
        let line = self.buf.clone();
        self.buf.clear();
        Some(line)
    }
}
