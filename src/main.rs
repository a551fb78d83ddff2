use anyhow::{Context as _, Result};
use clap::Parser;
use linkwatchd::{
    command::SystemCommander,
    config::DaemonConfig,
    diagnostics::DiagnosticReporter,
    ipc,
    ipc::event::EventBroadcaster,
    monitor::{watcher, MonitorEngine},
    settings::SettingsStore,
    AppContext,
};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "linkwatchd",
    about = "linkwatchd — background network-health monitor daemon",
    version
)]
struct Args {
    /// JSON-RPC WebSocket server port
    #[arg(long, env = "LINKWATCHD_PORT")]
    port: Option<u16>,

    /// Data directory for settings and diagnostic bundles
    #[arg(long, env = "LINKWATCHD_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LINKWATCHD_LOG")]
    log: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "LINKWATCHD_LOG_FILE")]
    log_file: Option<std::path::PathBuf>,

    /// Log output format: "pretty" (default) | "json"
    #[arg(long, env = "LINKWATCHD_LOG_FORMAT")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Arc::new(DaemonConfig::new(
        args.port,
        args.data_dir,
        args.log,
        args.log_file,
        args.log_format,
    ));

    // Keep the guard alive for the process lifetime so buffered log lines
    // are flushed on exit.
    let _log_guard = setup_logging(
        &config.log_level,
        config.log_file.as_deref(),
        &config.log_format,
    );

    info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %config.data_dir.display(),
        "linkwatchd starting"
    );

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data dir {}", config.data_dir.display()))?;

    let settings = Arc::new(SettingsStore::load(&config.data_dir));
    let broadcaster = Arc::new(EventBroadcaster::new());
    let commander: Arc<dyn linkwatchd::command::Commander> = Arc::new(SystemCommander);
    let engine = MonitorEngine::new(settings, Arc::clone(&commander), Arc::clone(&broadcaster));
    let reporter = Arc::new(DiagnosticReporter::new(&config.data_dir, commander));

    let ctx = Arc::new(AppContext {
        config,
        engine: Arc::clone(&engine),
        reporter,
        broadcaster,
        started_at: std::time::Instant::now(),
    });

    // The companion watcher runs for the whole process lifetime; monitoring
    // sessions come and go underneath it.
    tokio::spawn(watcher::run_watcher(engine));

    ipc::run(ctx).await
}

/// Initialize the tracing subscriber.
///
/// If a log file path is given, logs go to both stdout and a daily-rolling
/// file. If the log directory cannot be created, falls back to stdout-only
/// logging with a warning — never panics.
fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let use_json = log_format == "json";

    if let Some(path) = log_file {
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("linkwatchd.log"));

        // Ensure the directory exists before tracing-appender tries to open it.
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "warn: could not create log directory '{}': {e} — falling back to stdout",
                dir.display()
            );
            if use_json {
                tracing_subscriber::fmt()
                    .json()
                    .with_env_filter(log_level)
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .with_env_filter(log_level)
                    .compact()
                    .init();
            }
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if use_json {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json())
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact())
                .with(fmt::layer().with_writer(non_blocking))
                .init();
        }

        Some(guard)
    } else if use_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(log_level)
            .init();
        None
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(log_level)
            .compact()
            .init();
        None
    }
}
