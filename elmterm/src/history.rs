//! Bounded command history backed by a plain text file, one command per
//! line, newest at the end. File I/O is best-effort: a broken history file
//! must never take the session down.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use log::{debug, warn};

pub struct History {
    path: PathBuf,
    depth: usize,
    entries: Vec<String>,
}

impl History {
    /// Load what exists; a missing or unreadable file just starts empty.
    pub fn load(path: PathBuf, depth: usize) -> Self {
        let entries = match fs::read_to_string(&path) {
            Ok(text) => {
                let mut entries: Vec<String> = text
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(String::from)
                    .collect();
                if entries.len() > depth {
                    entries.drain(..entries.len() - depth);
                }
                entries
            }
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("could not read history {}: {e}", path.display());
                }
                Vec::new()
            }
        };

        debug!("history: {} entries from {}", entries.len(), path.display());
        Self {
            path,
            depth,
            entries,
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// The last `n` entries, oldest of them first.
    pub fn tail(&self, n: usize) -> &[String] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    /// Index (1-based, stable for the session) of the first entry returned
    /// by [`tail`] with the same `n`.
    pub fn tail_start_index(&self, n: usize) -> usize {
        self.entries.len().saturating_sub(n) + 1
    }

    pub fn push(&mut self, command: &str) {
        self.entries.push(command.to_string());
        if self.entries.len() > self.depth {
            let excess = self.entries.len() - self.depth;
            self.entries.drain(..excess);
        }
    }

    /// Rewrite the file atomically with the retained entries.
    pub fn save(&self) -> std::io::Result<()> {
        let tmp = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            for entry in &self.entries {
                writeln!(file, "{entry}")?;
            }
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("elmterm-history-{name}-{}", std::process::id()))
    }

    #[test]
    fn missing_file_starts_empty() {
        let history = History::load(scratch("missing"), 10);
        assert!(history.entries().is_empty());
    }

    #[test]
    fn push_save_load_round_trip() {
        let path = scratch("roundtrip");
        let mut history = History::load(path.clone(), 10);
        history.push("ATZ");
        history.push("0100");
        history.save().unwrap();

        let reloaded = History::load(path.clone(), 10);
        assert_eq!(reloaded.entries(), &["ATZ", "0100"]);
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn depth_bounds_entries_and_file() {
        let path = scratch("depth");
        let mut history = History::load(path.clone(), 3);
        for i in 0..10 {
            history.push(&format!("cmd{i}"));
        }
        assert_eq!(history.entries(), &["cmd7", "cmd8", "cmd9"]);
        history.save().unwrap();

        let reloaded = History::load(path.clone(), 3);
        assert_eq!(reloaded.entries(), &["cmd7", "cmd8", "cmd9"]);
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn tail_is_newest_suffix() {
        let mut history = History::load(scratch("tail"), 100);
        for i in 0..5 {
            history.push(&format!("cmd{i}"));
        }
        assert_eq!(history.tail(2), &["cmd3", "cmd4"]);
        assert_eq!(history.tail_start_index(2), 4);
        assert_eq!(history.tail(99).len(), 5);
    }
}
