use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One raw payload awaiting transformation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataStaging {
    pub id: Uuid,
    pub data_source_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_id: Option<String>,
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

impl DataStaging {
    pub fn new(data_source_id: impl Into<String>, data: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            data_source_id: data_source_id.into(),
            import_id: None,
            data,
            created_at: Utc::now(),
        }
    }

    pub fn with_import(mut self, import_id: impl Into<String>) -> Self {
        self.import_id = Some(import_id.into());
        self
    }
}
