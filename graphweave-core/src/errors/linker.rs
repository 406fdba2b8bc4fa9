use thiserror::Error;
use uuid::Uuid;

use crate::errors::{CacheError, QueueError};

/// Errors raised while resolving orphaned edges.
#[derive(Error, Debug)]
pub enum LinkerError {
    #[error("Edge {0} not found")]
    EdgeNotFound(Uuid),

    #[error("Edge {edge_id} unresolved after {attempts} attempts")]
    ResolutionExhausted { edge_id: Uuid, attempts: u32 },

    #[error("Invalid edge queue item: {0}")]
    InvalidQueueItem(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

impl LinkerError {
    /// Transient errors are retried through the queue; the rest are dropped.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LinkerError::Database(_) | LinkerError::Queue(_) | LinkerError::Cache(_)
        )
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            LinkerError::EdgeNotFound(_) => "NOT_FOUND",
            LinkerError::ResolutionExhausted { .. } => "RESOLUTION_EXHAUSTED",
            LinkerError::InvalidQueueItem(_) => "JSON_ERROR",
            LinkerError::Database(_) => "DATABASE_ERROR",
            LinkerError::Queue(_) => "QUEUE_ERROR",
            LinkerError::Cache(_) => "CACHE_ERROR",
        }
    }
}
