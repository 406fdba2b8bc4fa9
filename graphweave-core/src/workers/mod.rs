//! Long-running background tasks: one consume loop per queue topic plus the
//! periodic batch linking pass. Every task stops when the shutdown channel
//! flips to `true`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::EngineConfig;
use crate::errors::QueueError;
use crate::queue::{consume, ConsumeStats, MessageHandler, Queue, QueueMessage};
use crate::services::{EdgeLinker, EdgeQueueConsumer, ProcessingService};

/// Body of a message on the data processing topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessDataSource {
    pub data_source_id: String,
}

impl ProcessDataSource {
    pub fn new(data_source_id: impl Into<String>) -> Self {
        Self {
            data_source_id: data_source_id.into(),
        }
    }

    pub fn to_message(&self) -> Result<QueueMessage, QueueError> {
        QueueMessage::encode(self)
    }
}

struct ProcessingHandler {
    service: Arc<ProcessingService>,
}

#[async_trait]
impl MessageHandler for ProcessingHandler {
    async fn handle(&self, message: QueueMessage) -> anyhow::Result<()> {
        let request: ProcessDataSource = message.decode()?;
        self.service
            .process_data_source(&request.data_source_id)
            .await?;
        Ok(())
    }
}

pub fn spawn_edge_linker_worker(
    queue: Arc<dyn Queue>,
    consumer: Arc<EdgeQueueConsumer>,
    config: &EngineConfig,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<ConsumeStats> {
    let topic = config.edge_insertion_topic.clone();
    let poll_interval = config.poll_interval();
    tokio::spawn(async move { consume(queue, &topic, consumer, poll_interval, shutdown).await })
}

pub fn spawn_processing_worker(
    queue: Arc<dyn Queue>,
    service: Arc<ProcessingService>,
    config: &EngineConfig,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<ConsumeStats> {
    let topic = config.data_processing_topic.clone();
    let poll_interval = config.poll_interval();
    let handler = Arc::new(ProcessingHandler { service });
    tokio::spawn(async move { consume(queue, &topic, handler, poll_interval, shutdown).await })
}

/// Runs the batch linking pass every `interval`. Returns the number of
/// completed passes.
pub fn spawn_link_maintenance(
    linker: Arc<EdgeLinker>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<u64> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut passes = 0;

        loop {
            let closed = tokio::select! {
                _ = ticker.tick() => false,
                changed = shutdown.changed() => changed.is_err(),
            };

            if closed || *shutdown.borrow() {
                break;
            }

            match linker.link_orphaned_edges(None).await {
                Ok(report) => {
                    passes += 1;
                    if report.scanned > 0 {
                        info!(
                            "Link maintenance resolved {} of {} edges",
                            report.resolved, report.scanned
                        );
                    }
                }
                Err(err) => error!("Link maintenance pass failed: {}", err),
            }
        }

        passes
    })
}
