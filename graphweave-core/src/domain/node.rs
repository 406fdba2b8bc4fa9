use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::conversion::Conversion;

/// Conversion audit attached to every materialized node or edge.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityMetadata {
    #[serde(default)]
    pub conversions: Vec<Conversion>,
    #[serde(default)]
    pub failed_conversions: Vec<Conversion>,
}

impl EntityMetadata {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

/// Composite identity used for idempotent node upserts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeIdentity {
    pub container_id: String,
    pub metatype_id: String,
    pub data_source_id: String,
    pub original_data_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub container_id: String,
    pub metatype_id: String,
    pub properties: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_data_id: Option<String>,
    pub data_source_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_data_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_staging_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_mapping_transformation_id: Option<String>,
    #[serde(default)]
    pub metadata: EntityMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Node {
    pub fn identity(&self) -> NodeIdentity {
        NodeIdentity {
            container_id: self.container_id.clone(),
            metatype_id: self.metatype_id.clone(),
            data_source_id: self.data_source_id.clone(),
            original_data_id: self.original_data_id.clone(),
        }
    }
}
