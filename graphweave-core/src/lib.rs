//! graphweave: turns staged JSON payloads into typed graph nodes and edges.
//!
//! Declarative [`domain::TransformationRule`]s are applied by the
//! [`transform::TransformationEngine`]; the import driver in
//! [`services::ProcessingService`] persists the results, and the edge linker
//! resolves edge endpoints once the nodes they point at exist.

pub mod cache;
pub mod config;
pub mod database;
pub mod domain;
pub mod errors;
pub mod ontology;
pub mod queue;
pub mod services;
pub mod transform;
pub mod workers;

pub use config::EngineConfig;
pub use transform::{TransformationEngine, TransformationOutput};
