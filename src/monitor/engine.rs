//! Monitoring engine.
//!
//! Owns the shared status, the probe-target cache and the monitor session.
//! One engine instance is constructed at daemon startup and handed by
//! `Arc` to the RPC layer and the companion watcher — there is no global.
//!
//! The monitor loop is a fresh task per session: started on demand,
//! cancelled through a watch signal, joined with a bounded wait on stop.

use crate::command::Commander;
use crate::ipc::event::EventBroadcaster;
use crate::monitor::prober::Prober;
use crate::monitor::remediator::Remediator;
use crate::monitor::resolver::{ResolvedTarget, TargetResolver};
use crate::monitor::status::{new_shared_status, LinkStatus, SharedLinkStatus};
use crate::settings::{Settings, SettingsError, SettingsPatch, SettingsStore};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Companion streaming client binary name (`pgrep -x`).
const COMPANION_PROCESS: &str = "moonlight";

const DETECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Backoff while the probe target is still unresolved.
const RESOLVE_BACKOFF: Duration = Duration::from_secs(5);

/// Bounded wait for the monitor loop to observe the stop signal.
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

struct MonitorSession {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
    started_by_watcher: bool,
}

pub struct MonitorEngine {
    settings: Arc<SettingsStore>,
    status: SharedLinkStatus,
    resolver: TargetResolver,
    prober: Prober,
    remediator: Remediator,
    commander: Arc<dyn Commander>,
    broadcaster: Arc<EventBroadcaster>,
    session: Mutex<Option<MonitorSession>>,
}

impl MonitorEngine {
    pub fn new(
        settings: Arc<SettingsStore>,
        commander: Arc<dyn Commander>,
        broadcaster: Arc<EventBroadcaster>,
    ) -> Arc<Self> {
        Arc::new(Self {
            settings,
            status: new_shared_status(),
            resolver: TargetResolver::new(Arc::clone(&commander)),
            prober: Prober::new(Arc::clone(&commander)),
            remediator: Remediator::new(Arc::clone(&commander)),
            commander,
            broadcaster,
            session: Mutex::new(None),
        })
    }

    pub fn settings_store(&self) -> &SettingsStore {
        &self.settings
    }

    /// Current status snapshot.
    pub async fn snapshot(&self) -> LinkStatus {
        self.status.read().await.clone()
    }

    pub async fn is_running(&self) -> bool {
        self.status.read().await.is_running
    }

    /// Whether the current session was started by the companion watcher.
    /// `false` when monitoring is stopped.
    pub async fn watcher_initiated(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|s| s.started_by_watcher)
            .unwrap_or(false)
    }

    /// Start the monitor loop. Returns `false` if it was already running.
    pub async fn start_monitoring(self: Arc<Self>, started_by_watcher: bool) -> bool {
        let mut session = self.session.lock().await;
        if session.is_some() {
            return false;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        self.status.write().await.is_running = true;
        let handle = tokio::spawn(Arc::clone(&self).run_loop(stop_rx));
        *session = Some(MonitorSession {
            stop_tx,
            handle,
            started_by_watcher,
        });

        info!(by_watcher = started_by_watcher, "monitoring started");
        self.broadcaster.broadcast(
            "monitor.started",
            json!({ "startedByWatcher": started_by_watcher }),
        );
        true
    }

    /// Stop the monitor loop and clear the session's status.
    ///
    /// Waits a bounded time for the loop task to observe the signal; on
    /// timeout the task is detached — it exits at its next signal check
    /// and must not block the caller. Returns `false` if nothing was
    /// running.
    pub async fn stop_monitoring(&self) -> bool {
        let session = match self.session.lock().await.take() {
            Some(s) => s,
            None => return false,
        };

        let _ = session.stop_tx.send(true);
        if tokio::time::timeout(STOP_JOIN_TIMEOUT, session.handle)
            .await
            .is_err()
        {
            warn!("monitor loop did not exit within the stop window — detaching");
        }

        {
            let mut status = self.status.write().await;
            status.is_running = false;
            status.current_latency = None;
            status.ping_failed = false;
            status.restart_count = 0;
        }

        info!("monitoring stopped");
        self.broadcaster.broadcast("monitor.stopped", json!({}));
        true
    }

    /// Validate and merge a settings patch. A changed `ping_host` drops the
    /// cached gateway.
    pub async fn apply_settings(&self, patch: &SettingsPatch) -> Result<Settings, SettingsError> {
        let host_changed = match &patch.ping_host {
            Some(new_host) => *new_host != self.settings.current().await.ping_host,
            None => false,
        };
        let merged = self.settings.update(patch).await?;
        if host_changed {
            self.resolver.invalidate().await;
        }
        Ok(merged)
    }

    /// Reset the wireless radio through the configured mechanism.
    ///
    /// Shared by the monitor loop's threshold policy and the explicit
    /// `monitor.forceRestart` call: on success the restart counter is
    /// incremented and the gateway cache is dropped, since the network
    /// topology may differ after the link re-establishes.
    pub async fn restart_link(&self) -> bool {
        let settings = self.settings.current().await;
        let companion_active = self.companion_active().await;
        let ok = self
            .remediator
            .restart(settings.restart_method, companion_active)
            .await;

        if ok {
            let count = {
                let mut status = self.status.write().await;
                status.restart_count += 1;
                status.restart_count
            };
            self.resolver.invalidate().await;
            info!(restart_count = count, "wireless restart recorded");
            self.broadcaster
                .broadcast("link.remediated", json!({ "restartCount": count }));
        } else {
            error!(method = %settings.restart_method, "wireless restart failed");
        }
        ok
    }

    /// Probe for the companion client process, updating the shared status
    /// only when presence changes.
    pub async fn companion_active(&self) -> bool {
        let out = self
            .commander
            .run("pgrep", &["-x", COMPANION_PROCESS], DETECT_TIMEOUT)
            .await;
        let active = out.success;

        let mut status = self.status.write().await;
        if status.is_companion_running != active {
            debug!(active, "companion presence changed");
            status.is_companion_running = active;
        }
        active
    }

    async fn run_loop(self: Arc<Self>, mut stop_rx: watch::Receiver<bool>) {
        info!("monitor loop started");
        loop {
            if *stop_rx.borrow() {
                break;
            }
            let delay = self.monitor_tick().await;
            if wait_or_stop(&mut stop_rx, delay).await {
                break;
            }
        }
        debug!("monitor loop exited");
    }

    /// One monitoring pass: resolve, probe, publish, remediate on breach.
    /// Returns how long to sleep before the next pass.
    pub(crate) async fn monitor_tick(&self) -> Duration {
        let settings = self.settings.current().await;

        let host = match self.resolver.resolve(&settings.ping_host).await {
            ResolvedTarget::Literal(host) => {
                self.set_detected_host(host.clone()).await;
                host
            }
            ResolvedTarget::Gateway(ip) => {
                self.set_detected_host(format!("{ip} (Gateway)")).await;
                ip
            }
            ResolvedTarget::Unknown => {
                self.set_detected_host("Detecting...".to_string()).await;
                return RESOLVE_BACKOFF;
            }
        };

        let outcome = self.prober.probe(&host).await;
        {
            let mut status = self.status.write().await;
            status.current_latency = outcome.latency_ms;
            status.ping_failed = !outcome.reachable;
        }

        // Breach = unreachable, or latency strictly above the threshold.
        let breached = !outcome.reachable
            || outcome
                .latency_ms
                .map(|latency| latency > settings.ping_threshold)
                .unwrap_or(false);
        if settings.auto_restart && breached {
            self.restart_link().await;
        }

        Duration::from_secs(settings.ping_interval.max(1))
    }

    async fn set_detected_host(&self, label: String) {
        let mut status = self.status.write().await;
        if status.detected_ping_host != label {
            status.detected_ping_host = label;
        }
    }
}

/// Sleep for `delay`, waking early when the stop signal fires.
/// Returns `true` when the loop should stop.
async fn wait_or_stop(stop_rx: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        changed = stop_rx.changed() => changed.is_err() || *stop_rx.borrow(),
    }
}
