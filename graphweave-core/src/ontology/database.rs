use async_trait::async_trait;
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use tracing::debug;

use crate::database::entities::ontology_keys;
use crate::domain::{KeyKind, OntologyKey};
use crate::errors::OntologyError;
use crate::ontology::KeyLookup;

/// Reads keys from the `ontology_keys` table.
#[derive(Clone)]
pub struct DatabaseOntology {
    db: DatabaseConnection,
}

impl DatabaseOntology {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn find(&self, kind: KeyKind, id: &str) -> Result<Option<OntologyKey>, OntologyError> {
        let found = ontology_keys::Entity::find_by_id(id.to_string())
            .filter(ontology_keys::Column::Kind.eq(kind.as_str()))
            .one(&self.db)
            .await?;
        debug!("ontology {} key {} found: {}", kind.as_str(), id, found.is_some());
        Ok(found.map(OntologyKey::from))
    }

    /// Inserts or replaces a key definition.
    pub async fn save_key(
        &self,
        kind: KeyKind,
        parent_id: Option<&str>,
        key: &OntologyKey,
    ) -> Result<(), OntologyError> {
        let active = ontology_keys::ActiveModel {
            id: Set(key.id.clone()),
            kind: Set(kind.as_str().to_string()),
            parent_id: Set(parent_id.map(str::to_string)),
            property_name: Set(key.property_name.clone()),
            data_type: Set(key.data_type.as_str().to_string()),
            required: Set(key.required),
            created_at: Set(Utc::now()),
        };

        ontology_keys::Entity::delete_by_id(key.id.clone())
            .exec(&self.db)
            .await?;
        ontology_keys::Entity::insert(active).exec(&self.db).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyLookup for DatabaseOntology {
    async fn metatype_key(&self, id: &str) -> Result<Option<OntologyKey>, OntologyError> {
        self.find(KeyKind::Metatype, id).await
    }

    async fn relationship_key(&self, id: &str) -> Result<Option<OntologyKey>, OntologyError> {
        self.find(KeyKind::Relationship, id).await
    }
}
