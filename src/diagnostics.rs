// SPDX-License-Identifier: MIT
//! On-demand diagnostic bundles.
//!
//! Runs a fixed battery of OS introspection commands and serializes the
//! captured outputs into a timestamped JSON file under
//! `{data_dir}/diagnostic_logs/`. Only the newest bundles are retained.

use crate::command::{CommandOutput, Commander, DEFAULT_TIMEOUT};
use anyhow::{Context as _, Result};
use chrono::{Local, NaiveDateTime};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

const LOGS_DIR: &str = "diagnostic_logs";
const MAX_BUNDLES: usize = 10;
const BUNDLE_PREFIX: &str = "link_diagnostic_";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// The fixed introspection battery: (bundle key, program, args).
///
/// Pipelines go through `sh -c`. Individual failures are recorded in the
/// bundle rather than aborting it.
const BATTERY: &[(&str, &str, &[&str])] = &[
    ("system_info", "uname", &["-a"]),
    ("interface_state", "ip", &["addr"]),
    ("routing_table", "ip", &["route"]),
    ("network_manager_status", "nmcli", &["general", "status"]),
    ("device_status", "nmcli", &["device", "status"]),
    (
        "kernel_wifi_log",
        "sh",
        &["-c", "dmesg | grep -i -E 'wifi|wlan|iwl|firmware' | tail -n 50"],
    ),
    (
        "network_manager_journal",
        "sh",
        &["-c", "journalctl -u NetworkManager --no-pager -n 100"],
    ),
    (
        "pci_network_devices",
        "sh",
        &["-c", "lspci -nnv | grep -A 20 -i network"],
    ),
    ("loaded_modules", "lsmod", &[]),
];

/// One stored bundle, as returned by `diagnostics.list`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BundleEntry {
    pub filename: String,
    /// Wall-clock creation time, `YYYY-MM-DD HH:MM:SS`.
    pub timestamp: String,
    /// File size in bytes.
    pub size: u64,
}

pub struct DiagnosticReporter {
    logs_dir: PathBuf,
    commander: Arc<dyn Commander>,
}

impl DiagnosticReporter {
    pub fn new(data_dir: &Path, commander: Arc<dyn Commander>) -> Self {
        Self {
            logs_dir: data_dir.join(LOGS_DIR),
            commander,
        }
    }

    /// Run the battery and write a new bundle, rotating old ones out.
    pub async fn generate(&self) -> Result<PathBuf> {
        info!("collecting diagnostic bundle");
        let bundle = self.collect().await;

        tokio::fs::create_dir_all(&self.logs_dir)
            .await
            .with_context(|| format!("creating {}", self.logs_dir.display()))?;

        let filename = format!(
            "{BUNDLE_PREFIX}{}.json",
            Local::now().format(TIMESTAMP_FORMAT)
        );
        let path = self.logs_dir.join(filename);
        let json = serde_json::to_string_pretty(&bundle)?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("writing {}", path.display()))?;

        self.rotate().await;
        info!(path = %path.display(), "diagnostic bundle written");
        Ok(path)
    }

    /// List stored bundles, newest first. Files whose names don't carry a
    /// parsable timestamp are skipped.
    pub async fn list(&self) -> Vec<BundleEntry> {
        let mut dir = match tokio::fs::read_dir(&self.logs_dir).await {
            Ok(d) => d,
            Err(_) => return Vec::new(),
        };
        let mut entries = Vec::new();

        while let Ok(Some(entry)) = dir.next_entry().await {
            let filename = entry.file_name().to_string_lossy().into_owned();
            let Some(timestamp) = parse_bundle_timestamp(&filename) else {
                continue;
            };
            let size = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
            entries.push((
                timestamp,
                BundleEntry {
                    filename,
                    timestamp: timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                    size,
                },
            ));
        }

        entries.sort_by_key(|(ts, _)| std::cmp::Reverse(*ts));
        entries.into_iter().map(|(_, e)| e).collect()
    }

    /// Delete every stored bundle. Returns `false` when any removal fails.
    pub async fn delete_all(&self) -> bool {
        let mut dir = match tokio::fs::read_dir(&self.logs_dir).await {
            Ok(d) => d,
            // Nothing stored yet.
            Err(_) => return true,
        };

        let mut ok = true;
        while let Ok(Some(entry)) = dir.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Err(e) = tokio::fs::remove_file(&path).await {
                error!(path = %path.display(), err = %e, "could not delete bundle");
                ok = false;
            }
        }
        ok
    }

    async fn collect(&self) -> serde_json::Value {
        let mut bundle = serde_json::Map::new();
        bundle.insert(
            "report_metadata".to_string(),
            json!({ "timestamp": Local::now().to_rfc3339() }),
        );

        for (key, program, args) in BATTERY {
            let output: CommandOutput = self.commander.run(program, args, DEFAULT_TIMEOUT).await;
            bundle.insert(key.to_string(), json!(output));
        }
        serde_json::Value::Object(bundle)
    }

    /// Delete oldest-by-mtime bundles beyond the retention limit.
    async fn rotate(&self) {
        let mut files = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.logs_dir).await {
            Ok(d) => d,
            Err(_) => return,
        };
        while let Ok(Some(entry)) = dir.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let modified = entry
                .metadata()
                .await
                .ok()
                .and_then(|m| m.modified().ok())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            files.push((modified, path));
        }

        if files.len() <= MAX_BUNDLES {
            return;
        }

        info!(
            stored = files.len(),
            max = MAX_BUNDLES,
            "rotating old diagnostic bundles"
        );
        files.sort_by_key(|(modified, _)| *modified);
        for (_, path) in files.iter().take(files.len() - MAX_BUNDLES) {
            if let Err(e) = tokio::fs::remove_file(path).await {
                warn!(path = %path.display(), err = %e, "could not rotate bundle");
            }
        }
    }
}

fn parse_bundle_timestamp(filename: &str) -> Option<NaiveDateTime> {
    let stem = filename.strip_prefix(BUNDLE_PREFIX)?.strip_suffix(".json")?;
    NaiveDateTime::parse_from_str(stem, TIMESTAMP_FORMAT).ok()
}
