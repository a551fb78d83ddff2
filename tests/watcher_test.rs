//! Companion watcher integration: automatic session start/stop and
//! non-interference with explicitly started sessions. Runs under paused
//! Tokio time so the 10 s watcher ticks are instant.

use async_trait::async_trait;
use linkwatchd::command::{CommandOutput, Commander};
use linkwatchd::ipc::event::EventBroadcaster;
use linkwatchd::monitor::{watcher, MonitorEngine};
use linkwatchd::settings::{SettingsPatch, SettingsStore};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Pops a queued response per program name; unscripted programs fail.
#[derive(Default)]
struct ScriptedCommander {
    responses: Mutex<HashMap<String, VecDeque<CommandOutput>>>,
}

impl ScriptedCommander {
    fn push(&self, program: &str, output: CommandOutput) {
        self.responses
            .lock()
            .unwrap()
            .entry(program.to_string())
            .or_default()
            .push_back(output);
    }
}

#[async_trait]
impl Commander for ScriptedCommander {
    async fn run(&self, program: &str, _args: &[&str], _timeout: Duration) -> CommandOutput {
        self.responses
            .lock()
            .unwrap()
            .get_mut(program)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| CommandOutput::failed("unscripted command"))
    }
}

async fn make_engine(dir: &TempDir) -> (Arc<ScriptedCommander>, Arc<MonitorEngine>) {
    let settings = Arc::new(SettingsStore::load(dir.path()));
    settings
        .update(&SettingsPatch {
            // Literal host so no route lookup happens; remediation off so
            // failed probes cannot touch the restart counter.
            ping_host: Some("192.168.1.1".to_string()),
            auto_restart: Some(false),
            ..Default::default()
        })
        .await
        .unwrap();

    let commander = Arc::new(ScriptedCommander::default());
    let engine = MonitorEngine::new(
        settings,
        commander.clone() as Arc<dyn Commander>,
        Arc::new(EventBroadcaster::new()),
    );
    (commander, engine)
}

#[tokio::test(start_paused = true)]
async fn watcher_starts_and_stops_with_the_companion() {
    let dir = TempDir::new().unwrap();
    let (commander, engine) = make_engine(&dir).await;

    // First tick sees the companion; afterwards pgrep fails (companion gone).
    commander.push("pgrep", CommandOutput::ok("4242\n"));

    let watcher_task = tokio::spawn(watcher::run_watcher(engine.clone()));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(engine.is_running().await);
    assert!(engine.watcher_initiated().await);
    assert!(engine.snapshot().await.is_companion_running);

    // Next tick: companion exited — the watcher tears its own session down.
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert!(!engine.is_running().await);
    assert!(!engine.snapshot().await.is_companion_running);

    watcher_task.abort();
}

#[tokio::test(start_paused = true)]
async fn watcher_leaves_explicit_sessions_alone() {
    let dir = TempDir::new().unwrap();
    let (_commander, engine) = make_engine(&dir).await;

    // Companion is never running (pgrep unscripted — always fails).
    assert!(engine.clone().start_monitoring(false).await);
    let watcher_task = tokio::spawn(watcher::run_watcher(engine.clone()));

    tokio::time::sleep(Duration::from_secs(35)).await;
    assert!(engine.is_running().await);
    assert!(!engine.watcher_initiated().await);

    engine.stop_monitoring().await;
    watcher_task.abort();
}

#[tokio::test(start_paused = true)]
async fn disabled_auto_start_means_no_companion_checks() {
    let dir = TempDir::new().unwrap();
    let (commander, engine) = make_engine(&dir).await;
    engine
        .settings_store()
        .update(&SettingsPatch {
            auto_start_with_companion: Some(false),
            ..Default::default()
        })
        .await
        .unwrap();

    // Even with the companion present, nothing starts.
    commander.push("pgrep", CommandOutput::ok("4242\n"));
    let watcher_task = tokio::spawn(watcher::run_watcher(engine.clone()));

    tokio::time::sleep(Duration::from_secs(25)).await;
    assert!(!engine.is_running().await);
    assert!(!engine.snapshot().await.is_companion_running);

    watcher_task.abort();
}
