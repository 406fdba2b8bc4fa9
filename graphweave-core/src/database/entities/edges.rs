use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::domain::{
    parameters_from_value, uses_parameters, Edge, EdgeConnectionParameter, EntityMetadata,
};

/// Materialized edge. `origin_id`/`destination_id` stay NULL until the
/// linker finds the endpoint nodes; they are never overwritten once set.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "edges")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub container_id: String,
    pub metatype_relationship_pair_id: String,
    pub data_source_id: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub properties: serde_json::Value,
    pub origin_id: Option<Uuid>,
    pub destination_id: Option<Uuid>,
    pub origin_original_id: Option<String>,
    pub origin_metatype_id: Option<String>,
    pub origin_data_source_id: Option<String>,
    pub destination_original_id: Option<String>,
    pub destination_metatype_id: Option<String>,
    pub destination_data_source_id: Option<String>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub origin_parameters: Option<serde_json::Value>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub destination_parameters: Option<serde_json::Value>,
    pub import_data_id: Option<String>,
    pub data_staging_id: Option<Uuid>,
    pub type_mapping_transformation_id: Option<String>,
    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: serde_json::Value,
    pub created_at: ChronoDateTimeUtc,
    pub modified_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_resolved(&self) -> bool {
        self.origin_id.is_some() && self.destination_id.is_some()
    }

    pub fn origin_parameter_list(&self) -> Vec<EdgeConnectionParameter> {
        parameters_from_value(self.origin_parameters.as_ref())
    }

    pub fn destination_parameter_list(&self) -> Vec<EdgeConnectionParameter> {
        parameters_from_value(self.destination_parameters.as_ref())
    }

    pub fn uses_parameters(&self) -> bool {
        uses_parameters(
            self.origin_original_id.as_deref(),
            self.destination_original_id.as_deref(),
            &self.origin_parameter_list(),
            &self.destination_parameter_list(),
        )
    }
}

impl From<Model> for Edge {
    fn from(model: Model) -> Self {
        Edge {
            id: Some(model.id),
            container_id: model.container_id,
            metatype_relationship_pair_id: model.metatype_relationship_pair_id,
            data_source_id: model.data_source_id,
            properties: match model.properties {
                serde_json::Value::Object(map) => map,
                _ => Map::new(),
            },
            origin_id: model.origin_id,
            destination_id: model.destination_id,
            origin_original_id: model.origin_original_id,
            origin_metatype_id: model.origin_metatype_id,
            origin_data_source_id: model.origin_data_source_id,
            destination_original_id: model.destination_original_id,
            destination_metatype_id: model.destination_metatype_id,
            destination_data_source_id: model.destination_data_source_id,
            origin_parameters: parameters_from_value(model.origin_parameters.as_ref()),
            destination_parameters: parameters_from_value(model.destination_parameters.as_ref()),
            import_data_id: model.import_data_id,
            data_staging_id: model.data_staging_id,
            type_mapping_transformation_id: model.type_mapping_transformation_id,
            metadata: EntityMetadata::from_value(&model.metadata),
            created_at: Some(model.created_at),
        }
    }
}
