//! Splits the adapter byte stream into lines.
//!
//! ELM327 clones disagree about line endings: CR, LF, CRLF and longer runs
//! all occur in the wild, and every response ends with a `>` prompt that is
//! not part of any line. The framer owns a buffer that persists across
//! feeds, so a line split over two reads is reassembled transparently.

use log::trace;

const PROMPT: u8 = b'>';

#[derive(Default)]
pub struct LineFramer {
    buf: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` and return every complete line now available.
    /// Empty lines are dropped; prompt bytes at the buffer head are
    /// consumed without being part of a line.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.buf.extend_from_slice(bytes);

        let mut lines = Vec::new();

        loop {
            let prompts = self.buf.iter().take_while(|&&b| b == PROMPT).count();
            if prompts > 0 {
                self.buf.drain(..prompts);
            }

            let Some(pos) = self.buf.iter().position(|&b| is_terminator(b)) else {
                break;
            };

            let mut end = pos;
            while end < self.buf.len() && is_terminator(self.buf[end]) {
                end += 1;
            }

            let line: Vec<u8> = self.buf.drain(..end).take(pos).collect();
            if !line.is_empty() {
                trace!("framed line: {:?}", String::from_utf8_lossy(&line));
                lines.push(line);
            }
        }

        lines
    }

    /// Bytes held back waiting for a terminator.
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }
}

#[inline]
fn is_terminator(b: u8) -> bool {
    b == b'\r' || b == b'\n'
}
