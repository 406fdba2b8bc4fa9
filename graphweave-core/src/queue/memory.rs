use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use crate::errors::QueueError;
use crate::queue::{Queue, QueueMessage};

/// Per-topic in-process queue.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    topics: DashMap<String, VecDeque<QueueMessage>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies of the messages on `topic` without consuming them.
    pub fn peek_all(&self, topic: &str) -> Vec<QueueMessage> {
        self.topics
            .get(topic)
            .map(|messages| messages.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Queue for MemoryQueue {
    async fn put(&self, topic: &str, message: QueueMessage) -> Result<(), QueueError> {
        self.topics
            .entry(topic.to_string())
            .or_default()
            .push_back(message);
        Ok(())
    }

    async fn poll(&self, topic: &str) -> Result<Option<QueueMessage>, QueueError> {
        let Some(mut messages) = self.topics.get_mut(topic) else {
            return Ok(None);
        };

        let now = Utc::now();
        let next = messages
            .iter()
            .enumerate()
            .filter(|(_, message)| message.is_available(now))
            .min_by_key(|(_, message)| message.available_at)
            .map(|(position, _)| position);

        Ok(next.and_then(|position| messages.remove(position)))
    }

    async fn pending(&self, topic: &str) -> Result<usize, QueueError> {
        Ok(self.topics.get(topic).map(|m| m.len()).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_delayed_messages_are_hidden() {
        let queue = MemoryQueue::new();
        queue
            .put("edges", QueueMessage::new(json!(1)).delayed(Duration::from_secs(60)))
            .await
            .unwrap();
        queue.put("edges", QueueMessage::new(json!(2))).await.unwrap();

        let polled = queue.poll("edges").await.unwrap().unwrap();
        assert_eq!(polled.payload, json!(2));
        assert!(queue.poll("edges").await.unwrap().is_none());
        assert_eq!(queue.pending("edges").await.unwrap(), 1);
        assert!(queue.poll("other").await.unwrap().is_none());
    }
}
