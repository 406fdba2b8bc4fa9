use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::{DataType, OntologyKey};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ontology_keys")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// "metatype" or "relationship"
    pub kind: String,
    /// Owning metatype or relationship id
    pub parent_id: Option<String>,
    pub property_name: String,
    pub data_type: String,
    pub required: bool,
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for OntologyKey {
    fn from(model: Model) -> Self {
        OntologyKey {
            id: model.id,
            property_name: model.property_name,
            data_type: DataType::from(model.data_type),
            required: model.required,
        }
    }
}
