use thiserror::Error;

/// Queue transport failures.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Invalid queue payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Queue '{0}' is closed")]
    Closed(String),
}

impl QueueError {
    pub fn error_code(&self) -> &'static str {
        match self {
            QueueError::Database(_) => "DATABASE_ERROR",
            QueueError::Payload(_) => "JSON_ERROR",
            QueueError::Closed(_) => "QUEUE_CLOSED",
        }
    }
}

/// Dedup cache failures.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),
}
