use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::DataStaging;

/// Raw payload awaiting transformation. `inserted_at` is set once the record
/// has been processed; `errors` holds the per-rule failure messages.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "data_staging")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub data_source_id: String,
    pub import_id: Option<String>,
    #[sea_orm(column_type = "JsonBinary")]
    pub data: serde_json::Value,
    #[sea_orm(column_type = "JsonBinary")]
    pub errors: Option<serde_json::Value>,
    pub inserted_at: Option<ChronoDateTimeUtc>,
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn error_list(&self) -> Vec<String> {
        self.errors
            .as_ref()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default()
    }
}

impl From<Model> for DataStaging {
    fn from(model: Model) -> Self {
        DataStaging {
            id: model.id,
            data_source_id: model.data_source_id,
            import_id: model.import_id,
            data: model.data,
            created_at: model.created_at,
        }
    }
}
