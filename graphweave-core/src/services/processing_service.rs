//! Import driver: applies every active rule of a data source to its staged
//! records and persists the results.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use sea_orm::{DatabaseConnection, TransactionTrait};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::database::entities::data_staging;
use crate::domain::{DataStaging, EdgeQueueItem, TransformationRule};
use crate::errors::ProcessingError;
use crate::services::{
    EdgeQueueProducer, EdgeService, NodeService, StagingService, TransformationRepository,
};
use crate::transform::{TransformationEngine, TransformationOutput};

pub const NO_ACTIVE_TRANSFORMATIONS: &str = "no active transformations for data source";

/// Outcome of processing one staged record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordReport {
    pub staging_id: Option<Uuid>,
    pub nodes: usize,
    pub edges: usize,
    pub enqueued_edges: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceReport {
    pub data_source_id: String,
    pub records: usize,
    pub nodes: usize,
    pub edges: usize,
    /// Records that carry at least one transformation error.
    pub records_with_errors: usize,
    /// Records that could not be persisted at all and remain unprocessed.
    pub failed_records: usize,
}

impl SourceReport {
    fn new(data_source_id: &str) -> Self {
        Self {
            data_source_id: data_source_id.to_string(),
            ..Default::default()
        }
    }

    fn add(&mut self, record: &RecordReport) {
        self.records += 1;
        self.nodes += record.nodes;
        self.edges += record.edges;
        if !record.errors.is_empty() {
            self.records_with_errors += 1;
        }
    }
}

pub struct ProcessingService {
    db: DatabaseConnection,
    engine: Arc<TransformationEngine>,
    staging: StagingService,
    transformations: TransformationRepository,
    producer: Option<Arc<EdgeQueueProducer>>,
    concurrency: usize,
}

impl ProcessingService {
    pub fn new(db: DatabaseConnection, engine: Arc<TransformationEngine>) -> Self {
        Self {
            engine,
            staging: StagingService::new(db.clone()),
            transformations: TransformationRepository::new(db.clone()),
            db,
            producer: None,
            concurrency: 1,
        }
    }

    /// Hands every orphaned edge to `producer` after it is stored.
    pub fn with_edge_queue(mut self, producer: Arc<EdgeQueueProducer>) -> Self {
        self.producer = Some(producer);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Processes one staged record with the active rules of its data source.
    pub async fn process_record(&self, staging_id: Uuid) -> Result<RecordReport, ProcessingError> {
        let record = self
            .staging
            .get(staging_id)
            .await?
            .ok_or(ProcessingError::StagingNotFound(staging_id))?;
        let rules = self
            .transformations
            .list_active(&record.data_source_id)
            .await?;
        self.process_with_rules(record, &rules).await
    }

    async fn process_with_rules(
        &self,
        record: data_staging::Model,
        rules: &[TransformationRule],
    ) -> Result<RecordReport, ProcessingError> {
        let staging = DataStaging::from(record);
        let mut report = RecordReport {
            staging_id: Some(staging.id),
            ..Default::default()
        };
        let mut nodes = Vec::new();
        let mut edges = Vec::new();

        if rules.is_empty() {
            report.errors.push(NO_ACTIVE_TRANSFORMATIONS.to_string());
        }

        for rule in rules.iter().filter(|rule| !rule.archived) {
            match self.engine.apply(rule, &staging).await {
                Ok(TransformationOutput::Nodes(built)) => nodes.extend(built),
                Ok(TransformationOutput::Edges(built)) => edges.extend(built),
                Err(err) => report.errors.push(format!(
                    "unable to apply transformation {} to data: {}",
                    rule.display_id(),
                    err
                )),
            }
        }

        // First node wins per composite identity
        let mut seen = HashSet::new();
        nodes.retain(|node| node.original_data_id.is_none() || seen.insert(node.identity()));

        // Nodes, edges and the staging update commit together, so a failed
        // record leaves nothing behind for its retry to duplicate
        let txn = self.db.begin().await?;
        report.nodes = NodeService::upsert_all(&txn, nodes).await?.len();
        let stored = EdgeService::insert_all(&txn, edges).await?;
        report.edges = stored.len();
        StagingService::complete(&txn, staging.id, report.errors.clone()).await?;
        txn.commit().await?;

        // The batch pass picks up any edge that fails to enqueue here
        if let Some(producer) = &self.producer {
            for edge in stored.iter().filter(|edge| !edge.is_resolved()) {
                match producer
                    .enqueue(EdgeQueueItem::new(edge.id, edge.container_id.clone()))
                    .await
                {
                    Ok(true) => report.enqueued_edges += 1,
                    Ok(false) => {}
                    Err(err) => warn!("Failed to enqueue edge {} for linking: {}", edge.id, err),
                }
            }
        }

        Ok(report)
    }

    /// Processes every unprocessed staged record of a data source. A record
    /// that fails to persist is logged and left for the next run.
    #[instrument(skip(self))]
    pub async fn process_data_source(
        &self,
        data_source_id: &str,
    ) -> Result<SourceReport, ProcessingError> {
        let rules = self.transformations.list_active(data_source_id).await?;
        let records = self.staging.list_unprocessed(data_source_id).await?;
        let mut summary = SourceReport::new(data_source_id);

        if rules.is_empty() {
            warn!("Data source {} has no active transformations", data_source_id);
        }

        for record in records {
            let staging_id = record.id;
            match self.process_with_rules(record, &rules).await {
                Ok(report) => summary.add(&report),
                Err(err) => {
                    summary.failed_records += 1;
                    error!("Failed to process staged record {}: {}", staging_id, err);
                }
            }
        }

        info!(
            "Processed {} records from {} ({} nodes, {} edges, {} with errors)",
            summary.records,
            data_source_id,
            summary.nodes,
            summary.edges,
            summary.records_with_errors
        );
        Ok(summary)
    }

    /// Processes several data sources with bounded parallelism, one task per
    /// source. Results are returned in completion order.
    pub async fn process_data_sources(
        &self,
        data_source_ids: Vec<String>,
    ) -> Vec<Result<SourceReport, ProcessingError>> {
        stream::iter(data_source_ids)
            .map(|data_source_id| async move { self.process_data_source(&data_source_id).await })
            .buffer_unordered(self.concurrency)
            .collect()
            .await
    }
}
