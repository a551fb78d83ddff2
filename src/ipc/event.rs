//! Push notifications to connected RPC clients.
//!
//! Background tasks publish state changes (`monitor.started`,
//! `monitor.stopped`, `link.remediated`, `daemon.ready`) as JSON-RPC
//! notifications; every WebSocket connection holds a subscription and
//! forwards them alongside its request/response traffic.

use serde_json::Value;
use tokio::sync::broadcast;

/// Fan-out channel for JSON-RPC notification strings.
#[derive(Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<String>,
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    /// Publish a notification to every subscribed connection.
    ///
    /// A send with no subscribers is not an error — the daemon emits
    /// events whether or not a client is attached.
    pub fn broadcast(&self, method: &str, params: Value) {
        let notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params
        });
        let _ = self
            .tx
            .send(serde_json::to_string(&notification).unwrap_or_default());
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn subscribers_receive_notifications() {
        let broadcaster = EventBroadcaster::new();
        let mut rx = broadcaster.subscribe();

        broadcaster.broadcast("monitor.started", json!({ "startedByWatcher": true }));

        let raw = rx.recv().await.unwrap();
        let msg: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(msg["jsonrpc"], "2.0");
        assert_eq!(msg["method"], "monitor.started");
        assert_eq!(msg["params"]["startedByWatcher"], true);
        // Notifications carry no id.
        assert!(msg.get("id").is_none());
    }

    #[tokio::test]
    async fn broadcast_without_subscribers_is_fine() {
        let broadcaster = EventBroadcaster::new();
        broadcaster.broadcast("daemon.ready", json!({}));
    }
}
