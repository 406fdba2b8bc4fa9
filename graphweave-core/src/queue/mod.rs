//! Topic-based queue abstraction.
//!
//! Messages are removed from the queue when polled; retry and backoff are
//! the consumer's business, expressed by putting a new delayed message.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::errors::QueueError;

pub mod database;
pub mod memory;

pub use database::DatabaseQueue;
pub use memory::MemoryQueue;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub id: Uuid,
    pub payload: Value,
    pub available_at: DateTime<Utc>,
}

impl QueueMessage {
    pub fn new(payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
            available_at: Utc::now(),
        }
    }

    pub fn encode<T: Serialize>(body: &T) -> Result<Self, QueueError> {
        Ok(Self::new(serde_json::to_value(body)?))
    }

    /// Hides the message from consumers until `delay` has elapsed.
    pub fn delayed(mut self, delay: Duration) -> Self {
        let delay = chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        self.available_at = Utc::now() + delay;
        self
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }

    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        self.available_at <= now
    }
}

#[async_trait]
pub trait Queue: Send + Sync {
    async fn put(&self, topic: &str, message: QueueMessage) -> Result<(), QueueError>;

    /// Removes and returns the oldest available message on `topic`.
    async fn poll(&self, topic: &str) -> Result<Option<QueueMessage>, QueueError>;

    /// Messages on `topic`, including delayed ones.
    async fn pending(&self, topic: &str) -> Result<usize, QueueError>;
}

#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: QueueMessage) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumeStats {
    pub handled: u64,
    pub failed: u64,
}

/// Polls `topic` until `shutdown` flips to `true`.
///
/// Handler errors are logged and the message is not redelivered. When the
/// topic is empty the loop sleeps for `poll_interval`.
pub async fn consume(
    queue: Arc<dyn Queue>,
    topic: &str,
    handler: Arc<dyn MessageHandler>,
    poll_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> ConsumeStats {
    let mut stats = ConsumeStats::default();
    info!("Consuming topic {}", topic);

    loop {
        if *shutdown.borrow() {
            break;
        }

        match queue.poll(topic).await {
            Ok(Some(message)) => {
                let message_id = message.id;
                match handler.handle(message).await {
                    Ok(()) => {
                        stats.handled += 1;
                        debug!("Handled message {} on {}", message_id, topic);
                    }
                    Err(err) => {
                        stats.failed += 1;
                        warn!("Handler failed for message {} on {}: {:#}", message_id, topic, err);
                    }
                }
                continue;
            }
            Ok(None) => {}
            Err(err) => error!("Unable to poll topic {}: {}", topic, err),
        }

        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    info!(
        "Stopped consuming topic {} ({} handled, {} failed)",
        topic, stats.handled, stats.failed
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyHandler {
        seen: AtomicUsize,
    }

    #[async_trait]
    impl MessageHandler for FlakyHandler {
        async fn handle(&self, message: QueueMessage) -> anyhow::Result<()> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            if message.payload["fail"].as_bool().unwrap_or(false) {
                anyhow::bail!("boom");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_consume_logs_failures_and_does_not_redeliver() {
        let queue = Arc::new(MemoryQueue::new());
        queue.put("t", QueueMessage::new(json!({"fail": true}))).await.unwrap();
        queue.put("t", QueueMessage::new(json!({"fail": false}))).await.unwrap();

        let handler = Arc::new(FlakyHandler {
            seen: AtomicUsize::new(0),
        });
        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn(consume(
            queue.clone(),
            "t",
            handler.clone(),
            Duration::from_millis(5),
            rx,
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        let stats = task.await.unwrap();

        assert_eq!(stats, ConsumeStats { handled: 1, failed: 1 });
        assert_eq!(handler.seen.load(Ordering::SeqCst), 2);
        assert_eq!(queue.pending("t").await.unwrap(), 0);
    }

    #[test]
    fn test_message_round_trips_body() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Body {
            data_source_id: String,
        }

        let message = QueueMessage::encode(&Body {
            data_source_id: "ds1".into(),
        })
        .unwrap()
        .delayed(Duration::from_secs(30));

        assert!(!message.is_available(Utc::now()));
        let body: Body = message.decode().unwrap();
        assert_eq!(body.data_source_id, "ds1");
    }
}
