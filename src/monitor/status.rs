//! Shared link-health status.

use std::sync::Arc;
use tokio::sync::RwLock;

/// Snapshot of the monitor's externally visible state.
///
/// Written by the monitor loop, the companion watcher and explicit RPC
/// actions; read by `monitor.getStatus`. Writers update individual fields
/// last-writer-wins — no consumer needs cross-field atomicity, so the
/// relaxation is deliberate.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LinkStatus {
    /// Monitoring loop currently running.
    pub is_running: bool,
    /// Wireless restarts performed during the current session.
    pub restart_count: u64,
    /// Last measured round-trip time in milliseconds. `None` when unknown
    /// or unreachable, and always `None` while monitoring is stopped.
    pub current_latency: Option<f64>,
    /// Last probe failed to reach the target.
    pub ping_failed: bool,
    /// Companion streaming client detected as running.
    pub is_companion_running: bool,
    /// How the probe target was determined: a literal host,
    /// `"Detecting..."`, or `"<ip> (Gateway)"`.
    pub detected_ping_host: String,
}

impl Default for LinkStatus {
    fn default() -> Self {
        Self {
            is_running: false,
            restart_count: 0,
            current_latency: None,
            ping_failed: false,
            is_companion_running: false,
            detected_ping_host: "N/A".to_string(),
        }
    }
}

/// Shared status handle updated by the background tasks.
pub type SharedLinkStatus = Arc<RwLock<LinkStatus>>;

pub fn new_shared_status() -> SharedLinkStatus {
    Arc::new(RwLock::new(LinkStatus::default()))
}
