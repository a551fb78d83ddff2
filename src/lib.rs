pub mod command;
pub mod config;
pub mod diagnostics;
pub mod ipc;
pub mod monitor;
pub mod settings;

use std::sync::Arc;

use config::DaemonConfig;
use diagnostics::DiagnosticReporter;
use ipc::event::EventBroadcaster;
use monitor::MonitorEngine;

/// Shared application state passed to every RPC handler and background task.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<DaemonConfig>,
    pub engine: Arc<MonitorEngine>,
    pub reporter: Arc<DiagnosticReporter>,
    pub broadcaster: Arc<EventBroadcaster>,
    pub started_at: std::time::Instant,
}
