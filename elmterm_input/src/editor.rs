//! The line editor: a `(text, cursor)` pair plus history navigation.
//!
//! The editor owns no I/O. The session feeds it decoded keys and reads the
//! buffer back to redraw the prompt; history entries are borrowed from the
//! caller on each keystroke so the editor never holds a stale copy.

use crate::key::Key;

/// What a keystroke did to the editor.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Buffer or cursor changed; the prompt line needs a redraw.
    Edited,
    /// Nothing visible happened.
    Unchanged,
    /// CR or LF committed the buffer.
    Committed(String),
    /// Ctrl-C threw the line away.
    Cancelled,
    /// Ctrl-D on an empty buffer.
    Eof,
}

#[derive(Default)]
pub struct LineEditor {
    text: String,
    cursor: usize,
    /// Index into the caller's history while browsing, newest-first
    /// stepping; `None` means the floating unsaved tail is being edited.
    browse: Option<usize>,
    /// The unsaved line stashed away while browsing history.
    tail: String,
}

impl LineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Apply one key. `history` is ordered oldest first.
    pub fn handle(&mut self, key: Key, history: &[String]) -> Outcome {
        match key {
            Key::Char(c) => {
                self.text.insert(self.cursor, c);
                self.cursor += 1;
                Outcome::Edited
            }
            Key::Backspace => {
                if self.cursor == 0 {
                    return Outcome::Unchanged;
                }
                self.cursor -= 1;
                self.text.remove(self.cursor);
                Outcome::Edited
            }
            Key::Left => {
                if self.cursor == 0 {
                    return Outcome::Unchanged;
                }
                self.cursor -= 1;
                Outcome::Edited
            }
            Key::Right => {
                if self.cursor >= self.text.len() {
                    return Outcome::Unchanged;
                }
                self.cursor += 1;
                Outcome::Edited
            }
            Key::Up => self.browse_older(history),
            Key::Down => self.browse_newer(history),
            Key::Enter => {
                let line = std::mem::take(&mut self.text);
                self.reset();
                Outcome::Committed(line)
            }
            Key::Cancel => {
                self.reset();
                Outcome::Cancelled
            }
            Key::Eof => {
                if self.text.is_empty() {
                    Outcome::Eof
                } else {
                    Outcome::Unchanged
                }
            }
        }
    }

    fn browse_older(&mut self, history: &[String]) -> Outcome {
        let next = match self.browse {
            None if history.is_empty() => return Outcome::Unchanged,
            None => {
                self.tail = std::mem::take(&mut self.text);
                history.len() - 1
            }
            Some(0) => return Outcome::Unchanged,
            Some(i) => i - 1,
        };
        self.browse = Some(next);
        self.load(history[next].clone());
        Outcome::Edited
    }

    fn browse_newer(&mut self, history: &[String]) -> Outcome {
        let Some(i) = self.browse else {
            return Outcome::Unchanged;
        };
        if i + 1 < history.len() {
            self.browse = Some(i + 1);
            self.load(history[i + 1].clone());
        } else {
            // Past the newest entry: restore the unsaved tail.
            self.browse = None;
            let tail = std::mem::take(&mut self.tail);
            self.load(tail);
        }
        Outcome::Edited
    }

    fn load(&mut self, text: String) {
        self.cursor = text.len();
        self.text = text;
    }

    fn reset(&mut self) {
        self.text.clear();
        self.cursor = 0;
        self.browse = None;
        self.tail.clear();
    }
}
