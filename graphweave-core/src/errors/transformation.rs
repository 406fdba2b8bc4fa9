use thiserror::Error;

use crate::errors::OntologyError;

/// Failure applying one transformation rule to one staged record.
#[derive(Error, Debug)]
pub enum TransformationError {
    /// A `root_array` segment did not resolve to an array
    #[error("provided root array key '{path}' does not extract array from payload")]
    ArrayExtraction { path: String },

    /// A required key was missing from the payload
    #[error("unable to fetch data from payload for a required key '{property}'")]
    KeyExtraction { property: String },

    /// An edge mapping names a relationship key the ontology does not have
    #[error("unable to fetch keys to map payload, relationship key '{key_id}' does not exist")]
    MissingRelationshipKey { key_id: String },

    /// A value was present but could not be coerced under a failing policy
    #[error("unable to convert value for key '{property}': {reason}")]
    Conversion { property: String, reason: String },

    /// The rule names neither or both of its targets, or lacks edge keys
    #[error("invalid transformation configuration: {0}")]
    Configuration(String),

    /// Ontology key metadata could not be loaded
    #[error("ontology lookup failed: {0}")]
    Ontology(#[from] OntologyError),
}

impl TransformationError {
    /// Failures scoped to a single record; the import continues with the next one.
    pub fn is_record_failure(&self) -> bool {
        matches!(
            self,
            TransformationError::ArrayExtraction { .. }
                | TransformationError::KeyExtraction { .. }
                | TransformationError::Conversion { .. }
                | TransformationError::MissingRelationshipKey { .. }
        )
    }

    pub fn is_configuration_error(&self) -> bool {
        matches!(self, TransformationError::Configuration(_))
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            TransformationError::ArrayExtraction { .. } => "ARRAY_EXTRACTION",
            TransformationError::KeyExtraction { .. } => "KEY_EXTRACTION",
            TransformationError::MissingRelationshipKey { .. } => "MISSING_RELATIONSHIP_KEY",
            TransformationError::Conversion { .. } => "CONVERSION",
            TransformationError::Configuration(_) => "CONFIGURATION",
            TransformationError::Ontology(_) => "ONTOLOGY",
        }
    }
}
