use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::OntologyKey;
use crate::errors::OntologyError;
use crate::ontology::KeyLookup;

#[derive(Debug, Deserialize)]
struct OntologyFile {
    #[serde(default)]
    metatype_keys: Vec<OntologyKey>,
    #[serde(default)]
    relationship_keys: Vec<OntologyKey>,
}

/// Fixed key table, loadable from JSON:
///
/// ```json
/// {"metatype_keys": [...], "relationship_keys": [...]}
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryOntology {
    metatype_keys: HashMap<String, OntologyKey>,
    relationship_keys: HashMap<String, OntologyKey>,
}

impl InMemoryOntology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metatype_key(mut self, key: OntologyKey) -> Self {
        self.metatype_keys.insert(key.id.clone(), key);
        self
    }

    pub fn with_relationship_key(mut self, key: OntologyKey) -> Self {
        self.relationship_keys.insert(key.id.clone(), key);
        self
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let file: OntologyFile = serde_json::from_str(raw)?;
        let ontology = file
            .metatype_keys
            .into_iter()
            .fold(Self::new(), |ontology, key| ontology.with_metatype_key(key));
        Ok(file
            .relationship_keys
            .into_iter()
            .fold(ontology, |ontology, key| ontology.with_relationship_key(key)))
    }

    pub fn len(&self) -> usize {
        self.metatype_keys.len() + self.relationship_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyLookup for InMemoryOntology {
    async fn metatype_key(&self, id: &str) -> Result<Option<OntologyKey>, OntologyError> {
        Ok(self.metatype_keys.get(id).cloned())
    }

    async fn relationship_key(&self, id: &str) -> Result<Option<OntologyKey>, OntologyError> {
        Ok(self.relationship_keys.get(id).cloned())
    }
}
