//! Companion lifecycle watcher.
//!
//! One process-lifetime task polling for the companion streaming client.
//! While auto-linking is enabled it starts monitoring when the companion
//! appears and stops it again when the companion exits — but only for
//! sessions it started itself. Explicitly started sessions are left alone.

use crate::monitor::engine::MonitorEngine;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const WATCH_INTERVAL: Duration = Duration::from_secs(10);

/// Background task polling companion presence every 10 seconds.
///
/// Spawned once at daemon startup; runs until the Tokio runtime shuts down.
pub async fn run_watcher(engine: Arc<MonitorEngine>) {
    info!(
        interval_secs = WATCH_INTERVAL.as_secs(),
        "companion watcher started"
    );
    let mut interval = tokio::time::interval(WATCH_INTERVAL);

    loop {
        interval.tick().await;

        if !engine
            .settings_store()
            .current()
            .await
            .auto_start_with_companion
        {
            continue;
        }

        let companion_active = engine.companion_active().await;
        if companion_active && !engine.is_running().await {
            engine.clone().start_monitoring(true).await;
        } else if !companion_active
            && engine.is_running().await
            && engine.watcher_initiated().await
        {
            engine.stop_monitoring().await;
        }
    }
}
