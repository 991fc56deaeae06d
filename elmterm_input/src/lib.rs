//! Terminal input layer: raw-byte key decoding and the line editor state
//! machine. No file descriptors here; the session owns the terminal.

pub mod editor;
pub mod key;

pub use editor::{LineEditor, Outcome};
pub use key::{Key, KeyDecoder};
