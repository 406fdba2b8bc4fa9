use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Stored transformation rule. `definition` is the serialized rule body;
/// id, container, data source and archival live in columns.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "type_transformations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub container_id: String,
    pub data_source_id: String,
    pub name: Option<String>,
    #[sea_orm(column_type = "JsonBinary")]
    pub definition: serde_json::Value,
    pub archived: bool,
    pub created_at: ChronoDateTimeUtc,
    pub modified_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
