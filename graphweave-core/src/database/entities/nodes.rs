use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::domain::{EntityMetadata, Node, NodeIdentity};

/// Materialized node.
///
/// `(container_id, metatype_id, data_source_id, original_data_id)` is unique,
/// which makes re-running an import an upsert. Rows without an original id
/// never conflict.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "nodes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub container_id: String,
    pub metatype_id: String,
    pub data_source_id: String,
    pub original_data_id: Option<String>,
    #[sea_orm(column_type = "JsonBinary")]
    pub properties: serde_json::Value,
    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: serde_json::Value,
    pub import_data_id: Option<String>,
    pub data_staging_id: Option<Uuid>,
    pub type_mapping_transformation_id: Option<String>,
    pub created_at: ChronoDateTimeUtc,
    pub modified_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn identity(&self) -> NodeIdentity {
        NodeIdentity {
            container_id: self.container_id.clone(),
            metatype_id: self.metatype_id.clone(),
            data_source_id: self.data_source_id.clone(),
            original_data_id: self.original_data_id.clone(),
        }
    }
}

impl From<Model> for Node {
    fn from(model: Model) -> Self {
        Node {
            id: Some(model.id),
            container_id: model.container_id,
            metatype_id: model.metatype_id,
            properties: match model.properties {
                serde_json::Value::Object(map) => map,
                _ => Map::new(),
            },
            original_data_id: model.original_data_id,
            data_source_id: model.data_source_id,
            import_data_id: model.import_data_id,
            data_staging_id: model.data_staging_id,
            type_mapping_transformation_id: model.type_mapping_transformation_id,
            metadata: EntityMetadata::from_value(&model.metadata),
            created_at: Some(model.created_at),
        }
    }
}
