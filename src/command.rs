// SPDX-License-Identifier: MIT
//! External command execution with a hard timeout.
//!
//! Every OS command the daemon issues (route lookup, ping, dbus-send,
//! rfkill, pgrep, the diagnostic battery) goes through [`Commander::run`].
//! Failures never cross this boundary: spawn errors, non-zero exits and
//! timeouts all fold into a [`CommandOutput`] with `success = false`.

use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tracing::{error, warn};

/// Default per-command timeout, matching the diagnostic battery.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum captured output size (64 KiB) per stream.
const MAX_OUTPUT_BYTES: usize = 64 * 1024;

/// Captured result of one external command.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Seam between the monitor components and the operating system.
///
/// Production code uses [`SystemCommander`]; tests drive the components
/// with scripted outputs instead of real processes.
#[async_trait]
pub trait Commander: Send + Sync {
    async fn run(&self, program: &str, args: &[&str], timeout: Duration) -> CommandOutput;
}

/// Runs commands as real subprocesses via `tokio::process`.
#[derive(Default)]
pub struct SystemCommander;

#[async_trait]
impl Commander for SystemCommander {
    async fn run(&self, program: &str, args: &[&str], timeout: Duration) -> CommandOutput {
        let run = tokio::time::timeout(timeout, Command::new(program).args(args).output()).await;

        let output = match run {
            Ok(Ok(o)) => o,
            Ok(Err(e)) => {
                error!(program, err = %e, "command spawn failed");
                return CommandOutput::failed(format!("spawn error: {e}"));
            }
            Err(_) => {
                warn!(program, timeout_secs = timeout.as_secs(), "command timed out");
                return CommandOutput::failed(format!(
                    "timed out after {} seconds",
                    timeout.as_secs()
                ));
            }
        };

        let stdout = truncate_lossy(&output.stdout);
        let stderr = truncate_lossy(&output.stderr);
        let success = output.status.success();

        if !success {
            warn!(
                program,
                code = ?output.status.code(),
                stderr = %stderr.trim(),
                "command exited with error"
            );
        }

        CommandOutput {
            success,
            stdout,
            stderr,
        }
    }
}

fn truncate_lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(&bytes[..bytes.len().min(MAX_OUTPUT_BYTES)]).into_owned()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn nonexistent_binary_folds_into_failure() {
        let out = SystemCommander
            .run("linkwatchd-no-such-binary", &[], Duration::from_secs(1))
            .await;
        assert!(!out.success);
        assert!(out.stderr.contains("spawn error"));
    }

    #[tokio::test]
    async fn successful_command_captures_stdout() {
        let out = SystemCommander
            .run("echo", &["hello"], Duration::from_secs(5))
            .await;
        assert!(out.success);
        assert_eq!(out.stdout.trim(), "hello");
    }
}
