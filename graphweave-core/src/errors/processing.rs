use thiserror::Error;
use uuid::Uuid;

use crate::errors::OntologyError;

/// Errors from the import driver. Transformation failures never surface here;
/// they are recorded on the staged record instead.
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("Staged record {0} not found")]
    StagingNotFound(Uuid),

    #[error("Stored transformation {id} is invalid: {source}")]
    InvalidTransformation {
        id: Uuid,
        #[source]
        source: serde_json::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Ontology error: {0}")]
    Ontology(#[from] OntologyError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProcessingError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProcessingError::StagingNotFound(_))
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ProcessingError::StagingNotFound(_) => "NOT_FOUND",
            ProcessingError::InvalidTransformation { .. } => "VALIDATION_FAILED",
            ProcessingError::Database(_) => "DATABASE_ERROR",
            ProcessingError::Ontology(_) => "ONTOLOGY_ERROR",
            ProcessingError::Json(_) => "JSON_ERROR",
        }
    }
}
