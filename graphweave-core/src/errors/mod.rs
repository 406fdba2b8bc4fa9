//! Domain-specific error types for graphweave.
//!
//! # Error Categories
//!
//! - **TransformationError**: applying a rule to one staged payload
//! - **OntologyError**: ontology key lookups
//! - **QueueError** / **CacheError**: the queue and dedup-cache collaborators
//! - **LinkerError**: resolving orphaned edge endpoints
//! - **ProcessingError**: the import driver that persists transformation output
//!
//! Per-record failures are recovered by the caller and written to the staged
//! record's error list; only storage and infrastructure errors abort a batch.
//!
//! ```rust
//! use graphweave::errors::TransformationError;
//!
//! let err = TransformationError::ArrayExtraction {
//!     path: "car.parts".to_string(),
//! };
//! assert!(err.is_record_failure());
//! assert_eq!(err.error_code(), "ARRAY_EXTRACTION");
//! ```

pub mod linker;
pub mod ontology;
pub mod processing;
pub mod queue;
pub mod transformation;

pub use linker::LinkerError;
pub use ontology::OntologyError;
pub use processing::ProcessingError;
pub use queue::{CacheError, QueueError};
pub use transformation::TransformationError;

pub type TransformationResult<T> = Result<T, TransformationError>;
pub type LinkerResult<T> = Result<T, LinkerError>;
