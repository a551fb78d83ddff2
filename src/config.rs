//! Daemon runtime configuration.
//!
//! Covers how the process runs (port, data directory, logging); the
//! monitor's own behavior is configured through the persisted
//! [`crate::settings::Settings`] instead.

use std::path::PathBuf;

const DEFAULT_PORT: u16 = 4650;

/// Resolved daemon configuration.
///
/// Priority: CLI flag / env var > built-in default.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// JSON-RPC WebSocket server port (loopback only).
    pub port: u16,
    /// Directory for `settings.json` and `diagnostic_logs/`.
    pub data_dir: PathBuf,
    /// Log level filter string, e.g. "debug" or "info,linkwatchd=trace".
    pub log_level: String,
    /// Optional rolling log file path.
    pub log_file: Option<PathBuf>,
    /// Log output format: "pretty" (default) | "json".
    pub log_format: String,
}

impl DaemonConfig {
    pub fn new(
        port: Option<u16>,
        data_dir: Option<PathBuf>,
        log_level: Option<String>,
        log_file: Option<PathBuf>,
        log_format: Option<String>,
    ) -> Self {
        Self {
            port: port.unwrap_or(DEFAULT_PORT),
            data_dir: data_dir.unwrap_or_else(default_data_dir),
            log_level: log_level.unwrap_or_else(|| "info".to_string()),
            log_file,
            log_format: log_format.unwrap_or_else(|| "pretty".to_string()),
        }
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("linkwatchd");
        }
    }
    #[cfg(target_os = "linux")]
    {
        // $XDG_DATA_HOME/linkwatchd or ~/.local/share/linkwatchd
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            if !xdg.is_empty() {
                return PathBuf::from(xdg).join("linkwatchd");
            }
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("linkwatchd");
        }
    }
    PathBuf::from(".linkwatchd")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_values_win_over_defaults() {
        let config = DaemonConfig::new(
            Some(9100),
            Some(PathBuf::from("/tmp/lw")),
            Some("debug".to_string()),
            None,
            None,
        );
        assert_eq!(config.port, 9100);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/lw"));
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, "pretty");
    }

    #[test]
    fn defaults_fill_missing_values() {
        let config = DaemonConfig::new(None, Some(PathBuf::from("/tmp/lw")), None, None, None);
        assert_eq!(config.port, 4650);
        assert_eq!(config.log_level, "info");
    }
}
