//! Merges the three preference layers: built-in defaults, the optional
//! JSON preferences file, and the command line. CLI wins over file, file
//! wins over defaults.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use log::debug;
use serde::Deserialize;

use crate::cli::{self, Args, Target};
use crate::error::Error;
use crate::theme::ThemeChoice;

const DEFAULT_HISTORY_DEPTH: usize = 500;
const HISTORY_FILE: &str = ".elmterm.history";
const CONFIG_FILE: &str = ".elmterm.json";

/// Shape of `~/.elmterm.json`. Unknown keys are ignored so the file can be
/// shared with newer versions.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Preferences {
    theme: Option<ThemeChoice>,
    history_path: Option<PathBuf>,
    history_depth: Option<usize>,
}

/// Everything the session needs, fully resolved.
#[derive(Debug)]
pub struct Settings {
    pub target: Target,
    pub timeout: Duration,
    pub prompt: String,
    pub terminator: Vec<u8>,
    pub theme: ThemeChoice,
    pub history_path: PathBuf,
    pub history_depth: usize,
    pub hexdump: bool,
    pub plain: bool,
    pub timestamps: bool,
}

impl Settings {
    pub fn resolve(args: Args) -> Result<Self, Error> {
        let target = cli::parse_url(&args.url)?;
        let terminator = cli::parse_terminator(&args.terminator)?;

        let prefs = load_preferences(args.config)?;

        let history_path = args
            .history
            .or(prefs.history_path)
            .unwrap_or_else(|| home_file(HISTORY_FILE));

        Ok(Self {
            target,
            timeout: Duration::from_secs_f64(args.timeout),
            prompt: args.prompt,
            terminator,
            theme: args.theme.or(prefs.theme).unwrap_or(ThemeChoice::Light),
            history_path,
            history_depth: args
                .history_depth
                .or(prefs.history_depth)
                .unwrap_or(DEFAULT_HISTORY_DEPTH),
            hexdump: args.hexdump,
            plain: args.plain,
            timestamps: args.timestamps,
        })
    }
}

/// An explicitly given config path must exist and parse; the default path
/// is allowed to be absent.
fn load_preferences(explicit: Option<PathBuf>) -> Result<Preferences, Error> {
    let (path, required) = match explicit {
        Some(path) => (path, true),
        None => (home_file(CONFIG_FILE), false),
    };

    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Preferences::default());
        }
        Err(e) => {
            return Err(Error::Config {
                path,
                reason: e.to_string(),
            });
        }
    };

    debug!("loaded preferences from {}", path.display());

    serde_json::from_str(&text).map_err(|e| Error::Config {
        path,
        reason: e.to_string(),
    })
}

fn home_file(name: &str) -> PathBuf {
    match home::home_dir() {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn preferences_parse_and_ignore_unknown_keys() {
        let prefs: Preferences = serde_json::from_str(
            r#"{"theme": "dark", "historyDepth": 100, "futureKey": true}"#,
        )
        .unwrap();
        assert_eq!(prefs.theme, Some(ThemeChoice::Dark));
        assert_eq!(prefs.history_depth, Some(100));
        assert_eq!(prefs.history_path, None);
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let err = load_preferences(Some(PathBuf::from("/nonexistent/elmterm.json")));
        assert!(err.is_err());
    }

    #[test]
    fn explicit_config_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"historyPath": "/tmp/h"}}"#).unwrap();
        let prefs = load_preferences(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(prefs.history_path, Some(PathBuf::from("/tmp/h")));
    }

    #[test]
    fn malformed_config_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(load_preferences(Some(file.path().to_path_buf())).is_err());
    }
}
