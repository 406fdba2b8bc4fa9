//! Ontology key lookup.
//!
//! The engine never reads the ontology directly; it asks a [`KeyLookup`]
//! for the keys a rule references. Implementations are interchangeable:
//! an in-memory table for tests and dry runs, the `ontology_keys` table, or
//! either of those behind [`CachedKeyLookup`].

use async_trait::async_trait;

use crate::domain::OntologyKey;
use crate::errors::OntologyError;

pub mod cached;
pub mod database;
pub mod memory;

pub use cached::CachedKeyLookup;
pub use database::DatabaseOntology;
pub use memory::InMemoryOntology;

#[async_trait]
pub trait KeyLookup: Send + Sync {
    async fn metatype_key(&self, id: &str) -> Result<Option<OntologyKey>, OntologyError>;

    async fn relationship_key(&self, id: &str) -> Result<Option<OntologyKey>, OntologyError>;
}
