//! Materializes resolved keys into a [`Node`] or an [`Edge`].

use serde_json::Value;

use crate::domain::{
    DataStaging, Edge, EdgeConnectionParameter, EndpointTemplate, EntityMetadata, Node,
    TransformationRule,
};
use crate::transform::keys::ResolvedKeys;
use crate::transform::payload::get_nested_value;
use crate::transform::value::{is_truthy, stringify};

/// Builds entities for one rule over one staged record. Provenance fields are
/// copied from the staged record.
pub struct EntityBuilder<'a> {
    rule: &'a TransformationRule,
    staging: &'a DataStaging,
}

impl<'a> EntityBuilder<'a> {
    pub fn new(rule: &'a TransformationRule, staging: &'a DataStaging) -> Self {
        Self { rule, staging }
    }

    fn payload(&self) -> &'a Value {
        &self.staging.data
    }

    pub fn node(&self, metatype_id: &str, resolved: ResolvedKeys, index: &[usize]) -> Node {
        let original_data_id = self
            .rule
            .unique_identifier_key
            .as_deref()
            .and_then(|key| get_nested_value(key, self.payload(), index))
            .map(stringify);

        Node {
            id: None,
            container_id: self.rule.container_id.clone(),
            metatype_id: metatype_id.to_string(),
            properties: resolved.node_properties,
            original_data_id,
            data_source_id: self.staging.data_source_id.clone(),
            import_data_id: self.staging.import_id.clone(),
            data_staging_id: Some(self.staging.id),
            type_mapping_transformation_id: self.rule.id.clone(),
            metadata: EntityMetadata {
                conversions: resolved.conversions,
                failed_conversions: resolved.failed_conversions,
            },
            created_at: Some(self.staging.created_at),
        }
    }

    pub fn edge(
        &self,
        relationship_pair_id: &str,
        origin: EndpointTemplate<'_>,
        destination: EndpointTemplate<'_>,
        resolved: ResolvedKeys,
        index: &[usize],
    ) -> Edge {
        Edge {
            id: None,
            container_id: self.rule.container_id.clone(),
            metatype_relationship_pair_id: relationship_pair_id.to_string(),
            data_source_id: self.staging.data_source_id.clone(),
            properties: resolved.edge_properties,
            origin_id: None,
            destination_id: None,
            origin_original_id: self.endpoint_original_id(origin.id_key, index),
            origin_metatype_id: origin.metatype_id.map(str::to_string),
            origin_data_source_id: origin.data_source_id.map(str::to_string),
            destination_original_id: self.endpoint_original_id(destination.id_key, index),
            destination_metatype_id: destination.metatype_id.map(str::to_string),
            destination_data_source_id: destination.data_source_id.map(str::to_string),
            origin_parameters: self.fill_parameters(origin.parameters, index),
            destination_parameters: self.fill_parameters(destination.parameters, index),
            import_data_id: self.staging.import_id.clone(),
            data_staging_id: Some(self.staging.id),
            type_mapping_transformation_id: self.rule.id.clone(),
            metadata: EntityMetadata {
                conversions: resolved.conversions,
                failed_conversions: resolved.failed_conversions,
            },
            created_at: Some(self.staging.created_at),
        }
    }

    /// Falsy extracted ids leave the endpoint unset.
    fn endpoint_original_id(&self, key: Option<&str>, index: &[usize]) -> Option<String> {
        get_nested_value(key?, self.payload(), index)
            .filter(|value| is_truthy(Some(*value)))
            .map(stringify)
    }

    /// Copies the rule's parameters, replacing the value of every parameter
    /// that names a payload path with the value found there.
    fn fill_parameters(
        &self,
        parameters: &[EdgeConnectionParameter],
        index: &[usize],
    ) -> Vec<EdgeConnectionParameter> {
        parameters
            .iter()
            .map(|parameter| {
                let mut filled = parameter.clone();
                if let Some(key) = parameter.key.as_deref() {
                    filled.value = get_nested_value(key, self.payload(), index).cloned();
                }
                filled
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ParameterKind;
    use serde_json::json;

    #[test]
    fn test_edge_endpoints_use_truthiness() {
        let staging = DataStaging::new(
            "ds1",
            json!({"link": {"from": "MFR-1", "to": 0}}),
        );
        let mut rule = TransformationRule::edge("c1", "pair", "link.from", "link.to");
        rule.origin_metatype_id = Some("manufacturer".to_string());

        let builder = EntityBuilder::new(&rule, &staging);
        let edge = builder.edge(
            "pair",
            EndpointTemplate {
                metatype_id: Some("manufacturer"),
                ..EndpointTemplate::by_id_key("link.from")
            },
            EndpointTemplate::by_id_key("link.to"),
            ResolvedKeys::default(),
            &[],
        );

        assert_eq!(edge.origin_original_id.as_deref(), Some("MFR-1"));
        assert_eq!(edge.origin_metatype_id.as_deref(), Some("manufacturer"));
        assert_eq!(edge.destination_original_id, None);
        assert_eq!(edge.data_staging_id, Some(staging.id));
        assert!(edge.is_orphaned());
    }

    #[test]
    fn test_edge_parameters_take_values_from_payload_position() {
        let staging = DataStaging::new(
            "ds1",
            json!({"entries": [{"part": "oil"}, {"part": "tire"}]}),
        );
        let parameters = vec![
            EdgeConnectionParameter::new(ParameterKind::MetatypeId, "part"),
            EdgeConnectionParameter::from_payload(ParameterKind::OriginalId, "entries.[].part"),
        ];
        let rule = TransformationRule::edge("c1", "pair", "a.id", "b.id");
        let template = EndpointTemplate {
            id_key: None,
            metatype_id: None,
            data_source_id: None,
            parameters: &parameters,
        };

        let edge = EntityBuilder::new(&rule, &staging).edge(
            "pair",
            template,
            template,
            ResolvedKeys::default(),
            &[1],
        );

        assert_eq!(edge.origin_original_id, None);
        assert_eq!(edge.origin_parameters[0].value, Some(json!("part")));
        assert_eq!(edge.origin_parameters[1].value, Some(json!("tire")));
        assert_eq!(edge.destination_parameters, edge.origin_parameters);
        assert!(edge.uses_parameters());
    }

    #[test]
    fn test_node_original_id_is_stringified() {
        let staging = DataStaging::new("ds1", json!({"entries": [{"id": 7}]})).with_import("imp-1");
        let mut rule = TransformationRule::node("c1", "entry");
        rule.unique_identifier_key = Some("entries.[].id".to_string());

        let node = EntityBuilder::new(&rule, &staging).node("entry", ResolvedKeys::default(), &[0]);
        assert_eq!(node.original_data_id.as_deref(), Some("7"));
        assert_eq!(node.import_data_id.as_deref(), Some("imp-1"));
        assert_eq!(node.data_source_id, "ds1");
    }
}
