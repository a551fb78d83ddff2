//! Single-packet latency probe.

use crate::command::Commander;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Ping's own reply timeout (`-W`), in seconds.
const PING_REPLY_TIMEOUT_SECS: &str = "2";

/// Outer command timeout — a little above the ping timeout so the process
/// can exit on its own.
const PROBE_TIMEOUT: Duration = Duration::from_secs(4);

static RTT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"time=([\d.]+)").expect("rtt regex"));

/// Extract the round-trip time in milliseconds from ping output.
///
/// Matches the first `time=<float>` occurrence.
pub fn parse_rtt_ms(ping_output: &str) -> Option<f64> {
    RTT_RE
        .captures(ping_output)
        .and_then(|caps| caps[1].parse::<f64>().ok())
}

/// Result of one probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeOutcome {
    /// Measured latency in milliseconds; `None` when unreachable.
    pub latency_ms: Option<f64>,
    pub reachable: bool,
}

impl ProbeOutcome {
    const UNREACHABLE: Self = Self {
        latency_ms: None,
        reachable: false,
    };
}

pub struct Prober {
    commander: Arc<dyn Commander>,
}

impl Prober {
    pub fn new(commander: Arc<dyn Commander>) -> Self {
        Self { commander }
    }

    /// Send one probe packet to `host`.
    ///
    /// Reachable means the ping process succeeded AND its output carried a
    /// parsable round-trip time; every other outcome is unreachable.
    pub async fn probe(&self, host: &str) -> ProbeOutcome {
        let out = self
            .commander
            .run(
                "ping",
                &["-c", "1", "-W", PING_REPLY_TIMEOUT_SECS, host],
                PROBE_TIMEOUT,
            )
            .await;

        if out.success {
            if let Some(latency) = parse_rtt_ms(&out.stdout) {
                debug!(host, latency_ms = latency, "probe ok");
                return ProbeOutcome {
                    latency_ms: Some(latency),
                    reachable: true,
                };
            }
        }
        debug!(host, "probe failed");
        ProbeOutcome::UNREACHABLE
    }
}
