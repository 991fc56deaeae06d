//! ISO 15765-2 reassembly for segmented responses.
//!
//! Adapters print each CAN frame on its own line, so a long response (a
//! VIN, a DTC dump) arrives as a First Frame carrying the 12-bit total
//! length followed by Consecutive Frames with a 4-bit rolling sequence
//! number. One session holds at most one reassembly; a new First Frame
//! while one is in flight restarts silently, mirroring what real ECUs do
//! when a transfer is abandoned.

use log::{debug, warn};

/// Outcome of feeding one classified frame to the reassembler.
#[derive(Debug, PartialEq, Eq)]
pub enum Reassembly {
    /// A First Frame opened a transfer of `total` payload bytes.
    Started { total: usize },
    /// A Consecutive Frame was accepted; `received` of `total` bytes
    /// are buffered so far.
    Progress { received: usize, total: usize },
    /// The declared length has been reached; the payload is complete.
    Complete(Vec<u8>),
    /// A Consecutive Frame arrived with no transfer in flight.
    Orphan { seq: u8 },
    /// A Consecutive Frame broke the sequence; the transfer is dropped.
    OutOfSequence { expected: u8, got: u8 },
}

enum State {
    Idle,
    Collecting {
        total: usize,
        buffer: Vec<u8>,
        next_seq: u8,
    },
}

pub struct IsoTpReassembler {
    state: State,
}

impl Default for IsoTpReassembler {
    fn default() -> Self {
        Self { state: State::Idle }
    }
}

impl IsoTpReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop any transfer in flight. Called when the adapter session is
    /// torn down so a stale partial message cannot leak into the next one.
    pub fn reset(&mut self) {
        self.state = State::Idle;
    }

    /// Handle a frame whose first byte has upper nibble `0x1`.
    /// `frame` is the full post-header byte sequence, length >= 2.
    pub fn first_frame(&mut self, frame: &[u8]) -> Reassembly {
        if matches!(self.state, State::Collecting { .. }) {
            debug!("first frame while collecting; restarting reassembly");
        }

        let total = usize::from(frame[0] & 0x0F) << 8 | usize::from(frame[1]);
        let mut buffer = frame[2..].to_vec();
        buffer.truncate(total);

        self.state = State::Collecting {
            total,
            buffer,
            next_seq: 1,
        };

        Reassembly::Started { total }
    }

    /// Handle a frame whose first byte has upper nibble `0x2`.
    pub fn consecutive_frame(&mut self, frame: &[u8]) -> Reassembly {
        let seq = frame[0] & 0x0F;

        let State::Collecting {
            total,
            buffer,
            next_seq,
        } = &mut self.state
        else {
            warn!("consecutive frame {seq} with no first frame");
            return Reassembly::Orphan { seq };
        };

        if seq != *next_seq {
            let expected = *next_seq;
            warn!("sequence error: expected {expected}, got {seq}");
            self.state = State::Idle;
            return Reassembly::OutOfSequence { expected, got: seq };
        }

        buffer.extend_from_slice(&frame[1..]);
        *next_seq = (*next_seq + 1) % 16;

        if buffer.len() >= *total {
            buffer.truncate(*total);
            let message = std::mem::take(buffer);
            self.state = State::Idle;
            return Reassembly::Complete(message);
        }

        Reassembly::Progress {
            received: buffer.len(),
            total: *total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reassembles_declared_length() {
        let mut tp = IsoTpReassembler::new();

        assert_eq!(
            tp.first_frame(&[0x10, 0x14, 0x49, 0x02, 0x01, 0x57, 0x41, 0x55]),
            Reassembly::Started { total: 20 }
        );
        assert_eq!(
            tp.consecutive_frame(&[0x21, 0x5A, 0x5A, 0x5A, 0x38, 0x54, 0x38, 0x42]),
            Reassembly::Progress {
                received: 13,
                total: 20
            }
        );
        let done = tp.consecutive_frame(&[0x22, 0x41, 0x30, 0x33, 0x34, 0x33, 0x37, 0x34]);
        let Reassembly::Complete(message) = done else {
            panic!("expected a complete message, got {done:?}");
        };
        assert_eq!(message.len(), 20);
        assert_eq!(&message[..3], &[0x49, 0x02, 0x01]);
        assert_eq!(&message[3..], b"WAUZZZ8T8BA034374");
    }

    #[test]
    fn truncates_padding_past_declared_length() {
        let mut tp = IsoTpReassembler::new();
        tp.first_frame(&[0x10, 0x0A, 1, 2, 3, 4, 5, 6]);
        let done = tp.consecutive_frame(&[0x21, 7, 8, 9, 10, 0xAA, 0xAA, 0xAA]);
        assert_eq!(
            done,
            Reassembly::Complete(vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10])
        );
    }

    #[test]
    fn orphan_consecutive_frame() {
        let mut tp = IsoTpReassembler::new();
        assert_eq!(
            tp.consecutive_frame(&[0x21, 0xAA, 0xBB]),
            Reassembly::Orphan { seq: 1 }
        );
    }

    #[test]
    fn sequence_error_resets() {
        let mut tp = IsoTpReassembler::new();
        tp.first_frame(&[0x10, 0x14, 0x49, 0x02, 0x01, 0x57, 0x41, 0x55]);
        assert_eq!(
            tp.consecutive_frame(&[0x22, 0, 0, 0, 0, 0, 0, 0]),
            Reassembly::OutOfSequence {
                expected: 1,
                got: 2
            }
        );
        // The failed transfer is gone; the same frame is now an orphan.
        assert_eq!(
            tp.consecutive_frame(&[0x22, 0, 0, 0, 0, 0, 0, 0]),
            Reassembly::Orphan { seq: 2 }
        );
    }

    #[test]
    fn sequence_wraps_mod_16() {
        let mut tp = IsoTpReassembler::new();
        // 6 + 17 * 7 = 125 payload bytes; sequence numbers run 1..=15, 0, 1.
        tp.first_frame(&[0x10, 125, 0, 0, 0, 0, 0, 0]);
        for i in 0..16 {
            let seq = (1 + i) % 16;
            let r = tp.consecutive_frame(&[0x20 | seq, 0, 0, 0, 0, 0, 0, 0]);
            assert!(matches!(r, Reassembly::Progress { .. }), "frame {i}: {r:?}");
        }
        let done = tp.consecutive_frame(&[0x21, 0, 0, 0, 0, 0, 0, 0]);
        assert!(matches!(done, Reassembly::Complete(m) if m.len() == 125));
    }

    #[test]
    fn new_first_frame_restarts() {
        let mut tp = IsoTpReassembler::new();
        tp.first_frame(&[0x10, 0x14, 1, 2, 3, 4, 5, 6]);
        tp.first_frame(&[0x10, 0x08, 9, 9, 9, 9, 9, 9]);
        let done = tp.consecutive_frame(&[0x21, 9, 9, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA]);
        assert_eq!(done, Reassembly::Complete(vec![9, 9, 9, 9, 9, 9, 9, 9]));
    }
}
