use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Edges whose endpoints never resolved within the retry budget.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "edge_resolution_failures")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub edge_id: Uuid,
    pub container_id: String,
    pub attempts: i32,
    #[sea_orm(column_type = "Text")]
    pub reason: String,
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
