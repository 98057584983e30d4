//! Generic in-process pub/sub hub for real-time streaming.
//!
//! Provides topic-keyed broadcast channels for pushing pipeline progress to
//! SSE endpoints. Topics are opaque strings — the hub has no knowledge of
//! what's being streamed; payloads are typed per hub instance.
//!
//! # Usage
//!
//! Producers (the pipeline orchestrator):
//!   hub.publish("transcript:abc-123", ProgressEvent::Started { chunk_count: 0 }).await;
//!
//! Consumers (SSE endpoints):
//!   let rx = hub.subscribe("transcript:abc-123").await;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Generic in-process pub/sub hub.
///
/// Thread-safe, cloneable. Keyed by string topics. A publish with no
/// subscribers is a no-op; a slow subscriber never blocks the publisher
/// (it lags and drops instead). No history replay: late subscribers miss
/// earlier events.
pub struct StreamHub<T> {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<T>>>>,
    capacity: usize,
}

impl<T> Clone for StreamHub<T> {
    fn clone(&self) -> Self {
        Self {
            channels: Arc::clone(&self.channels),
            capacity: self.capacity,
        }
    }
}

impl<T: Clone + Send + 'static> StreamHub<T> {
    /// Create a new StreamHub with default capacity (256 messages per channel).
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create a new StreamHub with the given channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    /// Publish an event to a topic. No-op if no subscribers.
    pub async fn publish(&self, topic: &str, event: T) {
        let channels = self.channels.read().await;
        if let Some(tx) = channels.get(topic) {
            // Ignore send errors (no active receivers)
            let _ = tx.send(event);
        }
    }

    /// Subscribe to a topic. Creates the channel if it doesn't exist.
    pub async fn subscribe(&self, topic: &str) -> broadcast::Receiver<T> {
        let mut channels = self.channels.write().await;
        let tx = channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        tx.subscribe()
    }

    /// Remove channels with zero subscribers (housekeeping).
    pub async fn cleanup(&self) {
        let mut channels = self.channels.write().await;
        channels.retain(|_, tx| tx.receiver_count() > 0);
    }
}

impl<T: Clone + Send + 'static> Default for StreamHub<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::transcripts::ProgressEvent;

    #[tokio::test]
    async fn test_publish_subscribe_roundtrip() {
        let hub: StreamHub<ProgressEvent> = StreamHub::new();
        let mut rx = hub.subscribe("transcript:test").await;

        let event = ProgressEvent::ChunkDone {
            chunk: 1,
            total: 3,
            extracted: 2,
        };
        hub.publish("transcript:test", event.clone()).await;

        let received = rx.recv().await.unwrap();
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn test_publish_no_subscribers_is_noop() {
        let hub: StreamHub<ProgressEvent> = StreamHub::new();
        // Should not panic
        hub.publish(
            "nobody:listening",
            ProgressEvent::Failed {
                error: "dropped".to_string(),
            },
        )
        .await;
    }

    #[tokio::test]
    async fn test_cleanup_removes_empty_channels() {
        let hub: StreamHub<ProgressEvent> = StreamHub::new();
        let rx = hub.subscribe("ephemeral:topic").await;

        assert_eq!(hub.channels.read().await.len(), 1);

        drop(rx);
        hub.cleanup().await;

        assert_eq!(hub.channels.read().await.len(), 0);
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let hub: StreamHub<ProgressEvent> = StreamHub::new();
        let mut rx1 = hub.subscribe("multi:topic").await;
        let mut rx2 = hub.subscribe("multi:topic").await;

        let event = ProgressEvent::Started { chunk_count: 0 };
        hub.publish("multi:topic", event.clone()).await;

        assert_eq!(rx1.recv().await.unwrap(), event);
        assert_eq!(rx2.recv().await.unwrap(), event);
    }
}
