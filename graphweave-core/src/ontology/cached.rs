use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::{KeyKind, OntologyKey};
use crate::errors::OntologyError;
use crate::ontology::KeyLookup;

/// Memoizes hits of an inner lookup for the life of the process. Misses are
/// not cached, so keys created later are still found.
pub struct CachedKeyLookup<L> {
    inner: L,
    cache: Arc<DashMap<(KeyKind, String), OntologyKey>>,
}

impl<L: KeyLookup> CachedKeyLookup<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            cache: Arc::new(DashMap::new()),
        }
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    pub fn invalidate(&self, kind: KeyKind, id: &str) {
        self.cache.remove(&(kind, id.to_string()));
    }

    async fn lookup(&self, kind: KeyKind, id: &str) -> Result<Option<OntologyKey>, OntologyError> {
        let cache_key = (kind, id.to_string());
        if let Some(hit) = self.cache.get(&cache_key) {
            return Ok(Some(hit.value().clone()));
        }

        let fetched = match kind {
            KeyKind::Metatype => self.inner.metatype_key(id).await?,
            KeyKind::Relationship => self.inner.relationship_key(id).await?,
        };
        if let Some(key) = &fetched {
            self.cache.insert(cache_key, key.clone());
        }
        Ok(fetched)
    }
}

#[async_trait]
impl<L: KeyLookup> KeyLookup for CachedKeyLookup<L> {
    async fn metatype_key(&self, id: &str) -> Result<Option<OntologyKey>, OntologyError> {
        self.lookup(KeyKind::Metatype, id).await
    }

    async fn relationship_key(&self, id: &str) -> Result<Option<OntologyKey>, OntologyError> {
        self.lookup(KeyKind::Relationship, id).await
    }
}
