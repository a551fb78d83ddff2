//! Persisted monitor settings.
//!
//! Settings live in `{data_dir}/settings.json` and are mutable at any time
//! through `monitor.updateSettings`. The store is the sole writer of the
//! file; the monitor loop reads a fresh snapshot on every tick so changes
//! take effect on the next iteration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{info, warn};

const SETTINGS_FILE: &str = "settings.json";

/// Sentinel host value that enables default-gateway auto-detection.
pub const AUTO_HOST: &str = "auto";

const DEFAULT_PING_THRESHOLD_MS: f64 = 50.0;
const DEFAULT_PING_INTERVAL_SECS: u64 = 5;

/// Which mechanism resets the wireless radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestartMethod {
    /// NetworkManager `WirelessEnabled` property toggle over the system bus.
    /// Safe to use while a streaming session is active.
    Dbus,
    /// Kernel rfkill block/unblock. Disruptive to active sessions.
    Rfkill,
}

impl std::fmt::Display for RestartMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dbus => write!(f, "dbus"),
            Self::Rfkill => write!(f, "rfkill"),
        }
    }
}

/// Monitor settings as persisted to `settings.json`.
///
/// Unknown fields in the file are ignored and missing fields fill from
/// defaults, so older files keep loading across upgrades.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// `"auto"` (probe the default gateway) or a literal host.
    pub ping_host: String,
    /// Latency above this many milliseconds counts as degraded.
    pub ping_threshold: f64,
    /// Seconds between probes.
    pub ping_interval: u64,
    /// Remediate automatically when a probe breaches the threshold.
    pub auto_restart: bool,
    /// Preferred remediation mechanism.
    pub restart_method: RestartMethod,
    /// Let the companion watcher start/stop monitoring.
    pub auto_start_with_companion: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ping_host: AUTO_HOST.to_string(),
            ping_threshold: DEFAULT_PING_THRESHOLD_MS,
            ping_interval: DEFAULT_PING_INTERVAL_SECS,
            auto_restart: true,
            restart_method: RestartMethod::Dbus,
            auto_start_with_companion: true,
        }
    }
}

/// Partial settings update — only present fields are applied.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsPatch {
    pub ping_host: Option<String>,
    pub ping_threshold: Option<f64>,
    pub ping_interval: Option<u64>,
    pub auto_restart: Option<bool>,
    pub restart_method: Option<RestartMethod>,
    pub auto_start_with_companion: Option<bool>,
}

impl SettingsPatch {
    /// Validate before merging; a rejected patch leaves the store untouched.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if let Some(host) = &self.ping_host {
            if host.trim().is_empty() {
                return Err(SettingsError::EmptyHost);
            }
        }
        if let Some(threshold) = self.ping_threshold {
            if !threshold.is_finite() || threshold <= 0.0 {
                return Err(SettingsError::InvalidThreshold(threshold));
            }
        }
        if let Some(interval) = self.ping_interval {
            if interval == 0 {
                return Err(SettingsError::ZeroInterval);
            }
        }
        Ok(())
    }

    fn apply(&self, settings: &mut Settings) {
        if let Some(host) = &self.ping_host {
            settings.ping_host = host.clone();
        }
        if let Some(threshold) = self.ping_threshold {
            settings.ping_threshold = threshold;
        }
        if let Some(interval) = self.ping_interval {
            settings.ping_interval = interval;
        }
        if let Some(auto_restart) = self.auto_restart {
            settings.auto_restart = auto_restart;
        }
        if let Some(method) = self.restart_method {
            settings.restart_method = method;
        }
        if let Some(auto_start) = self.auto_start_with_companion {
            settings.auto_start_with_companion = auto_start;
        }
    }
}

/// A settings patch that failed validation.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("ping_host must not be empty")]
    EmptyHost,
    #[error("ping_threshold must be a positive number of milliseconds (got {0})")]
    InvalidThreshold(f64),
    #[error("ping_interval must be at least 1 second")]
    ZeroInterval,
}

/// Owner of the persisted settings file.
pub struct SettingsStore {
    path: PathBuf,
    current: RwLock<Settings>,
}

impl SettingsStore {
    /// Load settings from `{data_dir}/settings.json`.
    ///
    /// A missing file is created with defaults; an unreadable or corrupt
    /// file falls back to defaults without touching the file.
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(SETTINGS_FILE);
        let settings = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Settings>(&contents) {
                Ok(s) => s,
                Err(e) => {
                    warn!(path = %path.display(), err = %e, "settings file corrupt — using defaults");
                    Settings::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let defaults = Settings::default();
                persist(&path, &defaults);
                info!(path = %path.display(), "wrote default settings");
                defaults
            }
            Err(e) => {
                warn!(path = %path.display(), err = %e, "settings file unreadable — using defaults");
                Settings::default()
            }
        };

        Self {
            path,
            current: RwLock::new(settings),
        }
    }

    /// Fresh snapshot of the current settings.
    pub async fn current(&self) -> Settings {
        self.current.read().await.clone()
    }

    /// Validate and merge a partial update, then persist.
    ///
    /// Returns the merged settings. A failed write is logged and otherwise
    /// ignored — the in-memory state stays authoritative.
    pub async fn update(&self, patch: &SettingsPatch) -> Result<Settings, SettingsError> {
        patch.validate()?;
        let mut current = self.current.write().await;
        patch.apply(&mut current);
        persist(&self.path, &current);
        Ok(current.clone())
    }
}

fn persist(path: &Path, settings: &Settings) {
    let json = match serde_json::to_string_pretty(settings) {
        Ok(j) => j,
        Err(e) => {
            warn!(err = %e, "could not serialize settings");
            return;
        }
    };
    if let Err(e) = std::fs::write(path, json) {
        warn!(path = %path.display(), err = %e, "could not persist settings");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_creates_defaults() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::load(dir.path());
        let settings = store.current().await;
        assert_eq!(settings.ping_host, AUTO_HOST);
        assert_eq!(settings.ping_interval, 5);
        assert_eq!(settings.restart_method, RestartMethod::Dbus);
        assert!(dir.path().join("settings.json").exists());
    }

    #[tokio::test]
    async fn corrupt_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("settings.json"), "{not json").unwrap();
        let store = SettingsStore::load(dir.path());
        assert_eq!(store.current().await.ping_threshold, 50.0);
    }

    #[tokio::test]
    async fn partial_file_fills_missing_fields_from_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{ "ping_host": "192.168.0.10", "restart_method": "rfkill" }"#,
        )
        .unwrap();
        let store = SettingsStore::load(dir.path());
        let settings = store.current().await;
        assert_eq!(settings.ping_host, "192.168.0.10");
        assert_eq!(settings.restart_method, RestartMethod::Rfkill);
        assert!(settings.auto_restart);
        assert_eq!(settings.ping_interval, 5);
    }

    #[tokio::test]
    async fn patch_applies_only_present_fields_and_persists() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::load(dir.path());
        let patch = SettingsPatch {
            ping_threshold: Some(120.0),
            auto_restart: Some(false),
            ..Default::default()
        };
        let merged = store.update(&patch).await.unwrap();
        assert_eq!(merged.ping_threshold, 120.0);
        assert!(!merged.auto_restart);
        assert_eq!(merged.ping_host, AUTO_HOST);

        let reloaded = SettingsStore::load(dir.path());
        assert_eq!(reloaded.current().await.ping_threshold, 120.0);
    }

    #[tokio::test]
    async fn invalid_patch_is_rejected_and_leaves_store_untouched() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::load(dir.path());

        let patch = SettingsPatch {
            ping_threshold: Some(0.0),
            ..Default::default()
        };
        assert!(matches!(
            store.update(&patch).await,
            Err(SettingsError::InvalidThreshold(_))
        ));

        let patch = SettingsPatch {
            ping_interval: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            store.update(&patch).await,
            Err(SettingsError::ZeroInterval)
        ));

        let patch = SettingsPatch {
            ping_host: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            store.update(&patch).await,
            Err(SettingsError::EmptyHost)
        ));

        assert_eq!(store.current().await.ping_threshold, 50.0);
        assert_eq!(store.current().await.ping_interval, 5);
    }
}
