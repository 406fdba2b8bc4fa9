//! Orphaned edge resolution.
//!
//! Edges are stored with source-system endpoint ids and resolved to node ids
//! later, either by the periodic batch pass ([`EdgeLinker::link_orphaned_edges`])
//! or by the retrying queue path ([`EdgeQueueProducer`] / [`EdgeQueueConsumer`]).
//! Both only ever fill NULL endpoint columns, so they can run concurrently.
//!
//! An edge built from parameter filters instead of original ids is a
//! template: once both sides match at least one node it is replaced by one
//! resolved edge per origin and destination pair.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{DatabaseConnection, EntityTrait};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::cache::Cache;
use crate::config::EngineConfig;
use crate::database::entities::{edge_resolution_failures, edges};
use crate::domain::EdgeQueueItem;
use crate::errors::{LinkerError, LinkerResult};
use crate::queue::{MessageHandler, Queue, QueueMessage};
use crate::services::{EdgeService, NodeService};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Resolved,
    Orphaned,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkReport {
    pub scanned: u64,
    pub resolved: u64,
    pub still_orphaned: u64,
}

pub struct EdgeLinker {
    nodes: NodeService,
    edges: EdgeService,
    batch_size: u64,
}

impl EdgeLinker {
    pub fn new(db: DatabaseConnection, batch_size: u64) -> Self {
        Self {
            nodes: NodeService::new(db.clone()),
            edges: EdgeService::new(db),
            batch_size: batch_size.max(1),
        }
    }

    pub async fn resolve_edge(&self, edge_id: Uuid) -> LinkerResult<LinkState> {
        let edge = self
            .edges
            .get(edge_id)
            .await?
            .ok_or(LinkerError::EdgeNotFound(edge_id))?;
        self.resolve(&edge).await
    }

    async fn resolve(&self, edge: &edges::Model) -> LinkerResult<LinkState> {
        if edge.is_resolved() {
            return Ok(LinkState::Resolved);
        }
        if edge.uses_parameters() {
            return self.expand(edge).await;
        }

        let origin = match edge.origin_id {
            Some(_) => None,
            None => {
                self.find_endpoint(
                    edge,
                    edge.origin_data_source_id.as_deref(),
                    edge.origin_metatype_id.as_deref(),
                    edge.origin_original_id.as_deref(),
                )
                .await?
            }
        };
        let destination = match edge.destination_id {
            Some(_) => None,
            None => {
                self.find_endpoint(
                    edge,
                    edge.destination_data_source_id.as_deref(),
                    edge.destination_metatype_id.as_deref(),
                    edge.destination_original_id.as_deref(),
                )
                .await?
            }
        };

        if origin.is_none() && destination.is_none() {
            return Ok(LinkState::Orphaned);
        }

        let updated = self
            .edges
            .fill_endpoints(edge.id, origin, destination)
            .await?
            .ok_or(LinkerError::EdgeNotFound(edge.id))?;

        Ok(if updated.is_resolved() {
            debug!("Edge {} resolved", edge.id);
            LinkState::Resolved
        } else {
            LinkState::Orphaned
        })
    }

    async fn expand(&self, template: &edges::Model) -> LinkerResult<LinkState> {
        let origins = self
            .nodes
            .find_by_parameters(&template.container_id, &template.origin_parameter_list())
            .await?;
        let destinations = self
            .nodes
            .find_by_parameters(&template.container_id, &template.destination_parameter_list())
            .await?;
        if origins.is_empty() || destinations.is_empty() {
            return Ok(LinkState::Orphaned);
        }

        let pairs = origins
            .iter()
            .flat_map(|origin| destinations.iter().map(move |destination| (origin.id, destination.id)))
            .collect();
        match self.edges.expand_template(template, pairs).await? {
            Some(expanded) => {
                debug!("Edge {} expanded into {} edges", template.id, expanded.len());
                Ok(LinkState::Resolved)
            }
            // Another linker claimed the template first
            None => Ok(LinkState::Resolved),
        }
    }

    async fn find_endpoint(
        &self,
        edge: &edges::Model,
        data_source_id: Option<&str>,
        metatype_id: Option<&str>,
        original_id: Option<&str>,
    ) -> LinkerResult<Option<Uuid>> {
        let Some(original_id) = original_id else {
            return Ok(None);
        };
        let data_source_id = data_source_id.unwrap_or(edge.data_source_id.as_str());
        let node = self
            .nodes
            .find_endpoint(&edge.container_id, data_source_id, metatype_id, original_id)
            .await?;
        Ok(node.map(|node| node.id))
    }

    /// Batch pass over every orphaned edge, optionally scoped to a container.
    #[instrument(skip(self))]
    pub async fn link_orphaned_edges(&self, container_id: Option<&str>) -> LinkerResult<LinkReport> {
        let mut report = LinkReport::default();
        let mut after = None;

        loop {
            let page = self
                .edges
                .list_orphaned(container_id, after, self.batch_size)
                .await?;
            let Some(last) = page.last() else {
                break;
            };
            after = Some(last.id);

            for edge in &page {
                report.scanned += 1;
                match self.resolve(edge).await? {
                    LinkState::Resolved => report.resolved += 1,
                    LinkState::Orphaned => report.still_orphaned += 1,
                }
            }

            if (page.len() as u64) < self.batch_size {
                break;
            }
        }

        info!(
            "Linked {} of {} orphaned edges",
            report.resolved, report.scanned
        );
        Ok(report)
    }
}

/// Enqueues edges for the retrying linker, guarding against duplicate
/// outstanding attempts with an `edge_insertion_<id>` cache key.
pub struct EdgeQueueProducer {
    queue: Arc<dyn Queue>,
    cache: Arc<dyn Cache>,
    topic: String,
    dedup_ttl: Duration,
}

impl EdgeQueueProducer {
    pub fn new(
        queue: Arc<dyn Queue>,
        cache: Arc<dyn Cache>,
        topic: impl Into<String>,
        dedup_ttl: Duration,
    ) -> Self {
        Self {
            queue,
            cache,
            topic: topic.into(),
            dedup_ttl,
        }
    }

    pub fn from_config(queue: Arc<dyn Queue>, cache: Arc<dyn Cache>, config: &EngineConfig) -> Self {
        Self::new(queue, cache, config.edge_insertion_topic.clone(), config.dedup_ttl())
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Returns `false` when an attempt for this edge is already outstanding.
    /// The dedup key is rewritten either way, so a skipped enqueue still
    /// extends the window.
    pub async fn enqueue(&self, item: EdgeQueueItem) -> LinkerResult<bool> {
        let cache_key = item.cache_key();
        if let Some(attempts) = self.cache.get(&cache_key).await? {
            self.cache.set(&cache_key, &attempts, self.dedup_ttl).await?;
            debug!("Edge {} already queued", item.edge_id);
            return Ok(false);
        }
        self.put(item, Duration::ZERO).await?;
        Ok(true)
    }

    /// Puts a retry without the dedup check; the outstanding key belongs to
    /// this very item.
    pub async fn requeue(&self, item: EdgeQueueItem, delay: Duration) -> LinkerResult<()> {
        self.put(item, delay).await
    }

    async fn put(&self, item: EdgeQueueItem, delay: Duration) -> LinkerResult<()> {
        let cache_key = item.cache_key();
        let message = QueueMessage::encode(&item)?.delayed(delay);
        self.queue.put(&self.topic, message).await?;
        self.cache
            .set(&cache_key, &item.attempts.to_string(), self.dedup_ttl + delay)
            .await?;
        Ok(())
    }

    /// Releases the dedup key once an edge reaches a terminal state.
    pub async fn release(&self, edge_id: Uuid) -> LinkerResult<()> {
        self.cache
            .delete(&crate::domain::edge_insertion_cache_key(edge_id))
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Resolved,
    Retrying { attempt: u32, delay: Duration },
    /// Retry budget exhausted; recorded in `edge_resolution_failures`.
    Abandoned { attempts: u32 },
    /// The edge no longer exists.
    Dropped,
}

/// Handles one `EdgeQueueItem` per message: resolve, or requeue with a
/// delay of `attempts × backoff_multiplier`, or give up after `max_retries`.
pub struct EdgeQueueConsumer {
    db: DatabaseConnection,
    linker: Arc<EdgeLinker>,
    producer: Arc<EdgeQueueProducer>,
    backoff_multiplier: Duration,
    max_retries: u32,
}

impl EdgeQueueConsumer {
    pub fn new(
        db: DatabaseConnection,
        linker: Arc<EdgeLinker>,
        producer: Arc<EdgeQueueProducer>,
        backoff_multiplier: Duration,
        max_retries: u32,
    ) -> Self {
        Self {
            db,
            linker,
            producer,
            backoff_multiplier,
            max_retries,
        }
    }

    pub fn from_config(
        db: DatabaseConnection,
        linker: Arc<EdgeLinker>,
        producer: Arc<EdgeQueueProducer>,
        config: &EngineConfig,
    ) -> Self {
        Self::new(
            db,
            linker,
            producer,
            config.backoff_multiplier(),
            config.edge_insertion_max_retries,
        )
    }

    #[instrument(skip(self, message), fields(message_id = %message.id))]
    pub async fn handle_message(&self, message: &QueueMessage) -> LinkerResult<LinkOutcome> {
        let item: EdgeQueueItem = message.decode()?;
        self.handle_item(item).await
    }

    pub async fn handle_item(&self, item: EdgeQueueItem) -> LinkerResult<LinkOutcome> {
        match self.linker.resolve_edge(item.edge_id).await {
            Ok(LinkState::Resolved) => {
                self.producer.release(item.edge_id).await?;
                Ok(LinkOutcome::Resolved)
            }
            Ok(LinkState::Orphaned) => {
                self.retry_or_abandon(item, "endpoints not found").await
            }
            Err(LinkerError::EdgeNotFound(edge_id)) => {
                warn!("Dropping queue item for missing edge {}", edge_id);
                self.producer.release(edge_id).await?;
                Ok(LinkOutcome::Dropped)
            }
            Err(err) if err.is_transient() => {
                warn!("Transient failure resolving edge {}: {}", item.edge_id, err);
                let reason = err.to_string();
                self.retry_or_abandon(item, &reason).await
            }
            Err(err) => Err(err),
        }
    }

    async fn retry_or_abandon(
        &self,
        mut item: EdgeQueueItem,
        reason: &str,
    ) -> LinkerResult<LinkOutcome> {
        item.attempts += 1;
        item.last_attempt = Some(Utc::now());

        if item.attempts > self.max_retries {
            return self.abandon(item, reason).await;
        }

        let delay = self.backoff_multiplier * item.attempts;
        let attempt = item.attempts;
        debug!(
            "Edge {} unresolved, retry {} in {:?}",
            item.edge_id, attempt, delay
        );
        self.producer.requeue(item, delay).await?;
        Ok(LinkOutcome::Retrying { attempt, delay })
    }

    async fn abandon(&self, item: EdgeQueueItem, reason: &str) -> LinkerResult<LinkOutcome> {
        let exhausted = LinkerError::ResolutionExhausted {
            edge_id: item.edge_id,
            attempts: item.attempts,
        };
        error!("{}: {}", exhausted, reason);

        let failure = edge_resolution_failures::ActiveModel {
            id: Set(Uuid::new_v4()),
            edge_id: Set(item.edge_id),
            container_id: Set(item.container_id.clone()),
            attempts: Set(item.attempts as i32),
            reason: Set(reason.to_string()),
            created_at: Set(Utc::now()),
        };
        edge_resolution_failures::Entity::insert(failure)
            .exec(&self.db)
            .await?;
        self.producer.release(item.edge_id).await?;

        Ok(LinkOutcome::Abandoned {
            attempts: item.attempts,
        })
    }
}

#[async_trait]
impl MessageHandler for EdgeQueueConsumer {
    async fn handle(&self, message: QueueMessage) -> anyhow::Result<()> {
        let outcome = self.handle_message(&message).await?;
        debug!("Edge queue message {} -> {:?}", message.id, outcome);
        Ok(())
    }
}
