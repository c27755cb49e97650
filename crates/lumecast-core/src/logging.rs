//! Logging configuration.
//!
//! The daemon reads this from its config file, so every field has a default
//! and an unknown level string falls back to `info` rather than failing
//! startup.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const LOG_FILE_PREFIX: &str = "lumecast-";

/// Logging configuration for the daemon and tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default level directive (`error`, `warn`, `info`, `debug`, `trace`).
    pub level: String,
    /// Mirror log lines to stderr.
    pub console_output: bool,
    /// Write log lines to a timestamped file under `log_dir`.
    pub file_output: bool,
    /// Directory that receives log files.
    pub log_dir: PathBuf,
    /// Total number of log files kept in `log_dir`, including the new one.
    pub max_log_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
            file_output: false,
            log_dir: PathBuf::from("logs"),
            max_log_files: 5,
        }
    }
}

impl LogConfig {
    /// Parses the configured level, defaulting to INFO if invalid.
    pub fn parse_level(&self) -> tracing::Level {
        self.level.parse().unwrap_or(tracing::Level::INFO)
    }

    /// Creates the log directory if missing.
    pub fn ensure_log_directory(&self) -> io::Result<()> {
        fs::create_dir_all(&self.log_dir)
    }

    /// Path for a log file started now.
    pub fn current_log_path(&self) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        self.log_dir.join(format!("{LOG_FILE_PREFIX}{stamp}.log"))
    }

    /// Deletes the oldest log files so the directory stays within
    /// `max_log_files` after one more file is created.
    pub fn cleanup_old_logs(&self) -> io::Result<()> {
        if self.max_log_files == 0 {
            return Ok(());
        }
        let mut logs: Vec<PathBuf> = fs::read_dir(&self.log_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| is_log_file(path))
            .collect();
        // Timestamped names sort chronologically.
        logs.sort();
        let keep = self.max_log_files.saturating_sub(1);
        let excess = logs.len().saturating_sub(keep);
        for path in logs.into_iter().take(excess) {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

fn is_log_file(path: &Path) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return false,
    };
    name.starts_with(LOG_FILE_PREFIX) && name.ends_with(".log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert!(config.console_output);
        assert!(!config.file_output);
        assert_eq!(config.log_dir, PathBuf::from("logs"));
        assert_eq!(config.max_log_files, 5);
    }

    #[test]
    fn test_parse_level_falls_back_to_info() {
        let mut config = LogConfig::default();
        config.level = "debug".to_string();
        assert_eq!(config.parse_level(), tracing::Level::DEBUG);

        config.level = "not-a-level".to_string();
        assert_eq!(config.parse_level(), tracing::Level::INFO);
    }

    #[test]
    fn test_current_log_path_uses_log_dir() {
        let config = LogConfig::default();
        let path = config.current_log_path();
        assert!(path.starts_with("logs"));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with(LOG_FILE_PREFIX));
        assert!(name.ends_with(".log"));
    }

    #[test]
    fn test_cleanup_keeps_newest_logs() {
        let dir = tempfile::tempdir().unwrap();
        for stamp in [
            "20250101-000000",
            "20250102-000000",
            "20250103-000000",
            "20250104-000000",
        ] {
            fs::write(dir.path().join(format!("lumecast-{stamp}.log")), b"x").unwrap();
        }
        fs::write(dir.path().join("unrelated.txt"), b"x").unwrap();

        let config = LogConfig {
            log_dir: dir.path().to_path_buf(),
            max_log_files: 3,
            ..LogConfig::default()
        };
        config.cleanup_old_logs().unwrap();

        // Two survivors leave room for the file about to be created.
        let mut remaining: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        remaining.sort();
        assert_eq!(
            remaining,
            vec![
                "lumecast-20250103-000000.log",
                "lumecast-20250104-000000.log",
                "unrelated.txt",
            ]
        );
    }
}
