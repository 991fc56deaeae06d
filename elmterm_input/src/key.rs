//! Decodes raw-mode stdin bytes into editor keys.
//!
//! The reader hands us one byte at a time, so arrow keys arrive split
//! across calls. Only the three-byte `ESC [ <A|B|C|D>` form is recognized;
//! any other escape sequence is swallowed without producing a key.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Printable ASCII.
    Char(char),
    Enter,
    Backspace,
    Up,
    Down,
    Left,
    Right,
    /// Ctrl-C: cancel the line under composition.
    Cancel,
    /// Ctrl-D: end of input when the buffer is empty.
    Eof,
}

#[derive(Default, Clone, Copy)]
enum State {
    #[default]
    Ground,
    Escape,
    Csi,
}

#[derive(Default)]
pub struct KeyDecoder {
    state: State,
}

impl KeyDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte; a key comes out when a complete sequence has been
    /// seen.
    pub fn feed(&mut self, byte: u8) -> Option<Key> {
        match self.state {
            State::Ground => match byte {
                0x1B => {
                    self.state = State::Escape;
                    None
                }
                b'\r' | b'\n' => Some(Key::Enter),
                0x03 => Some(Key::Cancel),
                0x04 => Some(Key::Eof),
                0x08 | 0x7F => Some(Key::Backspace),
                0x20..=0x7E => Some(Key::Char(byte as char)),
                _ => None,
            },
            State::Escape => {
                self.state = if byte == b'[' {
                    State::Csi
                } else {
                    State::Ground
                };
                None
            }
            State::Csi => {
                self.state = State::Ground;
                match byte {
                    b'A' => Some(Key::Up),
                    b'B' => Some(Key::Down),
                    b'C' => Some(Key::Right),
                    b'D' => Some(Key::Left),
                    _ => None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(bytes: &[u8]) -> Vec<Key> {
        let mut decoder = KeyDecoder::new();
        bytes.iter().filter_map(|&b| decoder.feed(b)).collect()
    }

    #[test]
    fn printable_and_control() {
        assert_eq!(
            feed_all(b"at\r"),
            vec![Key::Char('a'), Key::Char('t'), Key::Enter]
        );
        assert_eq!(feed_all(&[0x03, 0x04, 0x7F, 0x08]), vec![
            Key::Cancel,
            Key::Eof,
            Key::Backspace,
            Key::Backspace
        ]);
    }

    #[test]
    fn arrow_sequences() {
        assert_eq!(
            feed_all(b"\x1b[A\x1b[B\x1b[C\x1b[D"),
            vec![Key::Up, Key::Down, Key::Right, Key::Left]
        );
    }

    #[test]
    fn unrecognized_escape_is_dropped() {
        assert_eq!(feed_all(b"\x1bOP"), vec![Key::Char('P')]);
        assert_eq!(feed_all(b"\x1b[Zx"), vec![Key::Char('x')]);
    }

    #[test]
    fn non_printable_ground_bytes_are_ignored() {
        assert_eq!(feed_all(&[0x00, 0x07, 0x1F, b'z']), vec![Key::Char('z')]);
    }
}
