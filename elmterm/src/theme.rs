//! SGR palettes for the two supported terminal backgrounds.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeChoice {
    Light,
    Dark,
}

/// Escape sequences selecting a color per output role. `reset` is appended
/// after every colored span.
#[derive(Debug, Clone)]
pub struct Palette {
    pub prompt: &'static str,
    pub outgoing: &'static str,
    pub incoming: &'static str,
    pub headline: &'static str,
    pub detail: &'static str,
    pub warning: &'static str,
    pub error: &'static str,
    pub status: &'static str,
    pub timestamp: &'static str,
    pub reset: &'static str,
}

impl Palette {
    pub fn new(choice: ThemeChoice) -> Self {
        match choice {
            ThemeChoice::Light => Self::light(),
            ThemeChoice::Dark => Self::dark(),
        }
    }

    /// Dim foregrounds that stay readable on a light background.
    fn light() -> Self {
        Self {
            prompt: "\x1b[1m",
            outgoing: "\x1b[34m",
            incoming: "\x1b[32m",
            headline: "\x1b[1;35m",
            detail: "\x1b[2m",
            warning: "\x1b[33m",
            error: "\x1b[31m",
            status: "\x1b[36m",
            timestamp: "\x1b[2m",
            reset: "\x1b[0m",
        }
    }

    /// Bright foregrounds for dark backgrounds.
    fn dark() -> Self {
        Self {
            prompt: "\x1b[1m",
            outgoing: "\x1b[94m",
            incoming: "\x1b[92m",
            headline: "\x1b[1;95m",
            warning: "\x1b[93m",
            detail: "\x1b[90m",
            error: "\x1b[91m",
            status: "\x1b[96m",
            timestamp: "\x1b[90m",
            reset: "\x1b[0m",
        }
    }
}
