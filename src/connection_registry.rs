//! In-memory registry of live duplex connections, keyed by user id (with
//! the reserved key `"anon"` for unauthenticated connections).
//!
//! The one invariant that matters here: the registry mutex is acquired,
//! the target list is snapshotted, the lock is released, and only then do
//! sends happen. A send must never happen while the mutex is held,
//! otherwise one slow subscriber stalls every other connect/disconnect.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const ANON_USER: &str = "anon";

/// A single outbound channel to a connected client. An external transport
/// layer (HTTP/WebSocket server) implements this and registers instances
/// via [`ConnectionRegistry::connect`].
#[async_trait]
pub trait DuplexSink: Send + Sync {
    async fn send(&self, payload: serde_json::Value) -> anyhow::Result<()>;
}

#[derive(Default)]
pub struct ConnectionRegistry {
    connections: Arc<Mutex<HashMap<String, Vec<Arc<dyn DuplexSink>>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn connect(&self, user_id: Option<&str>, sink: Arc<dyn DuplexSink>) {
        let key = user_id.unwrap_or(ANON_USER).to_string();
        let mut guard = self.connections.lock().await;
        guard.entry(key).or_insert_with(Vec::new).push(sink);
    }

    /// Removes `sink` from `user_id`'s channel list by pointer identity.
    /// Drops the user's entry entirely once its last channel is gone.
    pub async fn disconnect(&self, user_id: Option<&str>, sink: &Arc<dyn DuplexSink>) {
        let key = user_id.unwrap_or(ANON_USER).to_string();
        let mut guard = self.connections.lock().await;
        if let Some(channels) = guard.get_mut(&key) {
            channels.retain(|c| !Arc::ptr_eq(c, sink));
            if channels.is_empty() {
                guard.remove(&key);
            }
        }
    }

    /// Sends `payload` to every channel registered for `user_id`, or to
    /// every connected channel across all users when `user_id` is `None`.
    /// Per-channel send failures are logged and skipped; they never abort
    /// delivery to the remaining channels.
    pub async fn broadcast(&self, user_id: Option<&str>, payload: serde_json::Value) {
        let targets: Vec<Arc<dyn DuplexSink>> = {
            let guard = self.connections.lock().await;
            match user_id {
                Some(uid) => guard.get(uid).cloned().unwrap_or_default(),
                None => guard.values().flatten().cloned().collect(),
            }
        };

        for sink in targets {
            if let Err(e) = sink.send(payload.clone()).await {
                log::warn!("failed to deliver notification to a connection: {}", e);
            }
        }
    }

    pub async fn connection_count(&self, user_id: &str) -> usize {
        self.connections
            .lock()
            .await
            .get(user_id)
            .map(|c| c.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingSink {
        received: Arc<Mutex<Vec<serde_json::Value>>>,
        fail: bool,
    }

    #[async_trait]
    impl DuplexSink for RecordingSink {
        async fn send(&self, payload: serde_json::Value) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("simulated send failure");
            }
            self.received.lock().await.push(payload);
            Ok(())
        }
    }

    #[tokio::test]
    async fn broadcast_targets_only_the_named_user() {
        let registry = ConnectionRegistry::new();
        let received_a = Arc::new(Mutex::new(Vec::new()));
        let received_b = Arc::new(Mutex::new(Vec::new()));

        let sink_a: Arc<dyn DuplexSink> = Arc::new(RecordingSink {
            received: received_a.clone(),
            fail: false,
        });
        let sink_b: Arc<dyn DuplexSink> = Arc::new(RecordingSink {
            received: received_b.clone(),
            fail: false,
        });

        registry.connect(Some("user-a"), sink_a).await;
        registry.connect(Some("user-b"), sink_b).await;

        registry
            .broadcast(Some("user-a"), serde_json::json!({"hello": "a"}))
            .await;

        assert_eq!(received_a.lock().await.len(), 1);
        assert_eq!(received_b.lock().await.len(), 0);
    }

    #[tokio::test]
    async fn failing_send_does_not_block_siblings() {
        let registry = ConnectionRegistry::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let succeed_count = Arc::new(AtomicUsize::new(0));

        registry
            .connect(
                None,
                Arc::new(RecordingSink {
                    received: received.clone(),
                    fail: true,
                }),
            )
            .await;
        registry
            .connect(
                None,
                Arc::new(RecordingSink {
                    received: received.clone(),
                    fail: false,
                }),
            )
            .await;

        registry.broadcast(None, serde_json::json!({"ping": true})).await;
        succeed_count.fetch_add(received.lock().await.len(), Ordering::SeqCst);
        assert_eq!(succeed_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disconnect_removes_exact_sink() {
        let registry = ConnectionRegistry::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink: Arc<dyn DuplexSink> = Arc::new(RecordingSink {
            received,
            fail: false,
        });

        registry.connect(Some("user-a"), sink.clone()).await;
        assert_eq!(registry.connection_count("user-a").await, 1);

        registry.disconnect(Some("user-a"), &sink).await;
        assert_eq!(registry.connection_count("user-a").await, 0);
    }
}
