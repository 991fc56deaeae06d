//! Startup and session errors. Everything here ends the process with a
//! non-zero exit; recoverable conditions never become an `Error`.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid connection URL {0:?} (expected tty://<device> or tcp://<host>:<port>)")]
    InvalidUrl(String),

    #[error("unsupported baud rate {0}")]
    UnsupportedBaud(u32),

    #[error("invalid terminator spec {0:?}")]
    InvalidTerminator(String),

    #[error("config file {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("connecting to {target} timed out after {timeout:?}")]
    ConnectTimeout { target: String, timeout: Duration },

    #[error("connecting to {target}: {source}")]
    Connect {
        target: String,
        source: std::io::Error,
    },

    #[error("transport failed: {0}")]
    Transport(String),

    #[error("terminal setup: {0}")]
    Terminal(#[from] nix::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
