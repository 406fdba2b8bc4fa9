use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::node::EntityMetadata;

/// A relationship instance. Endpoints start out as source-system original ids
/// and are filled in with internal node ids by the edge linker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub container_id: String,
    pub metatype_relationship_pair_id: String,
    pub data_source_id: String,
    pub properties: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_original_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_metatype_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_data_source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_original_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_metatype_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_data_source_id: Option<String>,
    /// Node filters used instead of original ids. The linker expands the
    /// edge into one edge per matching origin and destination pair.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub origin_parameters: Vec<EdgeConnectionParameter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destination_parameters: Vec<EdgeConnectionParameter>,
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

impl Edge {
    /// Both endpoints point at internal node ids.
    pub fn is_resolved(&self) -> bool {
        self.origin_id.is_some() && self.destination_id.is_some()
    }

    pub fn is_orphaned(&self) -> bool {
        !self.is_resolved()
    }

    /// Whether endpoints come from parameter filters rather than original ids.
    pub fn uses_parameters(&self) -> bool {
        uses_parameters(
            self.origin_original_id.as_deref(),
            self.destination_original_id.as_deref(),
            &self.origin_parameters,
            &self.destination_parameters,
        )
    }
}

/// Original ids on both sides win over parameters; otherwise both sides need
/// at least one filter.
pub fn uses_parameters(
    origin_original_id: Option<&str>,
    destination_original_id: Option<&str>,
    origin_parameters: &[EdgeConnectionParameter],
    destination_parameters: &[EdgeConnectionParameter],
) -> bool {
    let has_original_ids = origin_original_id.is_some() && destination_original_id.is_some();
    !has_original_ids && !origin_parameters.is_empty() && !destination_parameters.is_empty()
}

/// What an [`EdgeConnectionParameter`] filters nodes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    DataSource,
    MetatypeId,
    OriginalId,
    /// A top-level node property, named by `property`.
    Property,
    /// The internal node id.
    Id,
}

/// One equality filter selecting candidate endpoint nodes. `key` is a
/// payload path; when set, the builder copies the extracted value into
/// `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeConnectionParameter {
    #[serde(rename = "type")]
    pub kind: ParameterKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl EdgeConnectionParameter {
    pub fn new(kind: ParameterKind, value: impl Into<Value>) -> Self {
        Self {
            kind,
            key: None,
            property: None,
            value: Some(value.into()),
        }
    }

    /// Takes its value from `path` in the payload.
    pub fn from_payload(kind: ParameterKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            key: Some(path.into()),
            property: None,
            value: None,
        }
    }

    pub fn property(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            property: Some(name.into()),
            ..Self::new(ParameterKind::Property, value)
        }
    }

    pub fn with_property(mut self, name: impl Into<String>) -> Self {
        self.property = Some(name.into());
        self
    }
}

/// Parameter lists travel as one JSON array column.
pub fn parameters_to_value(parameters: &[EdgeConnectionParameter]) -> Option<Value> {
    if parameters.is_empty() {
        return None;
    }
    serde_json::to_value(parameters).ok()
}

pub fn parameters_from_value(value: Option<&Value>) -> Vec<EdgeConnectionParameter> {
    value
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_default()
}

/// Unit of work for the retrying edge linker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeQueueItem {
    pub edge_id: Uuid,
    pub container_id: String,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt: Option<DateTime<Utc>>,
}

impl EdgeQueueItem {
    pub fn new(edge_id: Uuid, container_id: impl Into<String>) -> Self {
        Self {
            edge_id,
            container_id: container_id.into(),
            attempts: 0,
            last_attempt: None,
        }
    }

    /// Dedup cache key guarding against duplicate outstanding attempts.
    pub fn cache_key(&self) -> String {
        edge_insertion_cache_key(self.edge_id)
    }
}

pub fn edge_insertion_cache_key(edge_id: Uuid) -> String {
    format!("edge_insertion_{}", edge_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parameters_deserialize_with_type_tag() {
        let parameters: Vec<EdgeConnectionParameter> = serde_json::from_value(json!([
            {"type": "metatype_id", "value": "part"},
            {"type": "property", "property": "vendor", "key": "car.manufacturer.name"}
        ]))
        .unwrap();

        assert_eq!(parameters[0], EdgeConnectionParameter::new(ParameterKind::MetatypeId, "part"));
        assert_eq!(parameters[1].kind, ParameterKind::Property);
        assert_eq!(parameters[1].property.as_deref(), Some("vendor"));
        assert_eq!(parameters_from_value(parameters_to_value(&parameters).as_ref()), parameters);
        assert_eq!(parameters_to_value(&[]), None);
    }

    #[test]
    fn test_original_ids_take_precedence_over_parameters() {
        let filters = vec![EdgeConnectionParameter::new(ParameterKind::MetatypeId, "car")];
        assert!(uses_parameters(None, None, &filters, &filters));
        assert!(uses_parameters(Some("A"), None, &filters, &filters));
        assert!(!uses_parameters(Some("A"), Some("B"), &filters, &filters));
        assert!(!uses_parameters(None, None, &filters, &[]));
    }
}
