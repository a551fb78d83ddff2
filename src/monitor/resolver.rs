//! Probe-target resolution.
//!
//! A literal configured host is returned verbatim. In `"auto"` mode the
//! default-gateway IP is read from the route table and cached; the cache is
//! dropped when the configured host changes or after a wireless restart,
//! since the gateway may differ on the re-established link.

use crate::command::Commander;
use crate::settings::AUTO_HOST;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

const ROUTE_TIMEOUT: Duration = Duration::from_secs(5);

static GATEWAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"default via ([\d.]+)").expect("gateway regex"));

/// Extract the gateway IP from `ip route show default` output.
///
/// Matches the first `default via <ip>` occurrence.
pub fn parse_default_gateway(route_output: &str) -> Option<String> {
    GATEWAY_RE
        .captures(route_output)
        .map(|caps| caps[1].to_string())
}

/// Outcome of one resolution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTarget {
    /// The configured literal host.
    Literal(String),
    /// Auto-detected (or cached) default-gateway IP.
    Gateway(String),
    /// No route found yet — caller backs off and retries.
    Unknown,
}

pub struct TargetResolver {
    commander: Arc<dyn Commander>,
    cached_gateway: Mutex<Option<String>>,
}

impl TargetResolver {
    pub fn new(commander: Arc<dyn Commander>) -> Self {
        Self {
            commander,
            cached_gateway: Mutex::new(None),
        }
    }

    /// Resolve the probe target for the given configured host.
    pub async fn resolve(&self, configured_host: &str) -> ResolvedTarget {
        if configured_host != AUTO_HOST {
            return ResolvedTarget::Literal(configured_host.to_string());
        }

        if let Some(ip) = self.cached_gateway.lock().await.clone() {
            return ResolvedTarget::Gateway(ip);
        }

        let out = self
            .commander
            .run("ip", &["route", "show", "default"], ROUTE_TIMEOUT)
            .await;
        if out.success {
            if let Some(ip) = parse_default_gateway(&out.stdout) {
                info!(gateway = %ip, "detected default gateway");
                *self.cached_gateway.lock().await = Some(ip.clone());
                return ResolvedTarget::Gateway(ip);
            }
        }
        ResolvedTarget::Unknown
    }

    /// Drop the cached gateway so the next `"auto"` resolution re-queries
    /// the route table.
    pub async fn invalidate(&self) {
        let mut cached = self.cached_gateway.lock().await;
        if cached.take().is_some() {
            debug!("gateway cache invalidated");
        }
    }
}
