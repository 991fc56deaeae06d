//! Command line surface: the connection URL, flags, and the terminator
//! grammar.

use std::path::PathBuf;

use clap::Parser;

use crate::error::Error;
use crate::theme::ThemeChoice;

#[derive(Debug, Parser)]
#[command(
    name = "elmterm",
    about = "Interactive diagnostic terminal for ELM327/STN OBD-II adapters",
    version
)]
pub struct Args {
    /// Connection URL: tty://<device-path>[?baud=N] or tcp://<host>:<port>
    pub url: String,

    /// Connect timeout in seconds
    #[arg(short = 't', long, default_value_t = 12.0)]
    pub timeout: f64,

    /// REPL prompt
    #[arg(short = 'p', long, default_value = "> ")]
    pub prompt: String,

    /// Bytes appended to each command: cr, lf, crlf, none, hex:<HEX>,
    /// or a literal string
    #[arg(long, default_value = "cr")]
    pub terminator: String,

    /// History file (default ~/.elmterm.history)
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// Maximum retained history entries
    #[arg(long)]
    pub history_depth: Option<usize>,

    /// JSON preferences file (default ~/.elmterm.json)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Color palette
    #[arg(long, value_enum)]
    pub theme: Option<ThemeChoice>,

    /// Also print hex+ASCII dumps of incoming lines
    #[arg(long)]
    pub hexdump: bool,

    /// Disable the analyzer
    #[arg(long)]
    pub plain: bool,

    /// Prefix each output line with an ISO-8601 timestamp
    #[arg(long)]
    pub timestamps: bool,
}

/// Where the byte stream comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Tty { path: PathBuf, baud: u32 },
    Tcp { host: String, port: u16 },
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Tty { path, baud } => {
                write!(f, "tty://{}?baud={baud}", path.display())
            }
            Target::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
        }
    }
}

const DEFAULT_BAUD: u32 = 38_400;

pub fn parse_url(url: &str) -> Result<Target, Error> {
    let invalid = || Error::InvalidUrl(url.to_string());

    if let Some(rest) = url.strip_prefix("tty://") {
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };
        if path.is_empty() {
            return Err(invalid());
        }

        let mut baud = DEFAULT_BAUD;
        if let Some(query) = query {
            for pair in query.split('&') {
                match pair.split_once('=') {
                    Some(("baud", value)) => {
                        baud = value.parse().map_err(|_| invalid())?;
                    }
                    _ => return Err(invalid()),
                }
            }
        }

        return Ok(Target::Tty {
            path: PathBuf::from(path),
            baud,
        });
    }

    if let Some(rest) = url.strip_prefix("tcp://") {
        let (host, port) = rest.rsplit_once(':').ok_or_else(invalid)?;
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse().map_err(|_| invalid())?;
        return Ok(Target::Tcp {
            host: host.to_string(),
            port,
        });
    }

    Err(invalid())
}

/// `cr` / `\r` / `carriage-return`, `lf` / `\n`, `crlf` / `\r\n`, `none`,
/// `hex:<HEX>`; anything else is taken literally.
pub fn parse_terminator(spec: &str) -> Result<Vec<u8>, Error> {
    let lower = spec.to_ascii_lowercase();
    match lower.as_str() {
        "cr" | "\\r" | "carriage-return" => Ok(vec![0x0D]),
        "lf" | "\\n" => Ok(vec![0x0A]),
        "crlf" | "\\r\\n" => Ok(vec![0x0D, 0x0A]),
        "none" => Ok(vec![]),
        _ => {
            if let Some(digits) = lower.strip_prefix("hex:") {
                elmterm_obd::hex::parse_strict(digits)
                    .ok_or_else(|| Error::InvalidTerminator(spec.to_string()))
            } else {
                Ok(spec.as_bytes().to_vec())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tty_url_with_and_without_baud() {
        assert_eq!(
            parse_url("tty:///dev/ttyUSB0").unwrap(),
            Target::Tty {
                path: "/dev/ttyUSB0".into(),
                baud: 38_400
            }
        );
        assert_eq!(
            parse_url("tty:///dev/ttyUSB0?baud=115200").unwrap(),
            Target::Tty {
                path: "/dev/ttyUSB0".into(),
                baud: 115_200
            }
        );
    }

    #[test]
    fn tcp_url() {
        assert_eq!(
            parse_url("tcp://192.168.0.10:35000").unwrap(),
            Target::Tcp {
                host: "192.168.0.10".into(),
                port: 35000
            }
        );
    }

    #[test]
    fn bad_urls() {
        assert!(parse_url("http://example.com").is_err());
        assert!(parse_url("tcp://nohost").is_err());
        assert!(parse_url("tcp://:90000").is_err());
        assert!(parse_url("tty://").is_err());
        assert!(parse_url("tty:///dev/ttyUSB0?speed=1").is_err());
    }

    #[test]
    fn terminator_grammar() {
        assert_eq!(parse_terminator("cr").unwrap(), vec![0x0D]);
        assert_eq!(parse_terminator("\\r").unwrap(), vec![0x0D]);
        assert_eq!(parse_terminator("carriage-return").unwrap(), vec![0x0D]);
        assert_eq!(parse_terminator("LF").unwrap(), vec![0x0A]);
        assert_eq!(parse_terminator("crlf").unwrap(), vec![0x0D, 0x0A]);
        assert_eq!(parse_terminator("none").unwrap(), Vec::<u8>::new());
        assert_eq!(parse_terminator("hex:0D0A").unwrap(), vec![0x0D, 0x0A]);
        assert!(parse_terminator("hex:0G").is_err());
        assert_eq!(parse_terminator(";").unwrap(), vec![b';']);
    }
}
