use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::edge::EdgeConnectionParameter;
use crate::domain::ontology::DataType;
use crate::errors::TransformationError;

/// Comparison applied by a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "exists")]
    Exists,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
}

/// How a subexpression folds into the running result of its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Expression {
    And,
    Or,
}

/// A predicate over one payload path, optionally chained with AND/OR
/// subexpressions. Subexpressions do not nest further.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<Expression>,
    pub key: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subexpressions: Vec<Condition>,
}

impl Condition {
    pub fn new(key: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            expression: None,
            key: key.into(),
            operator,
            value: value.into(),
            subexpressions: Vec::new(),
        }
    }

    pub fn and(mut self, mut sub: Condition) -> Self {
        sub.expression = Some(Expression::And);
        self.subexpressions.push(sub);
        self
    }

    pub fn or(mut self, mut sub: Condition) -> Self {
        sub.expression = Some(Expression::Or);
        self.subexpressions.push(sub);
        self
    }
}

/// Binds a payload path (or a literal) to one ontology key.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct KeyMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metatype_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metatype_relationship_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<DataType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_conversion_format_string: Option<String>,
}

impl KeyMapping {
    pub fn metatype(path: impl Into<String>, metatype_key_id: impl Into<String>) -> Self {
        Self {
            key: Some(path.into()),
            metatype_key_id: Some(metatype_key_id.into()),
            ..Default::default()
        }
    }

    pub fn relationship(path: impl Into<String>, relationship_key_id: impl Into<String>) -> Self {
        Self {
            key: Some(path.into()),
            metatype_relationship_key_id: Some(relationship_key_id.into()),
            ..Default::default()
        }
    }

    pub fn with_literal(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_value_type(mut self, value_type: DataType) -> Self {
        self.value_type = Some(value_type);
        self
    }

    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.date_conversion_format_string = Some(format.into());
        self
    }
}

/// Action taken when a key cannot be extracted or converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorAction {
    Ignore,
    #[default]
    #[serde(alias = "fail on required")]
    FailOnRequired,
    Fail,
}

impl ErrorAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorAction::Ignore => "ignore",
            ErrorAction::FailOnRequired => "fail_on_required",
            ErrorAction::Fail => "fail",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransformationConfig {
    #[serde(default)]
    pub on_conversion_error: ErrorAction,
    #[serde(default)]
    pub on_key_extraction_error: ErrorAction,
}

/// A declarative rule turning one staged payload into nodes or edges.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransformationRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub container_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_array: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_identifier_key: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub keys: Vec<KeyMapping>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metatype_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metatype_relationship_pair_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_id_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_metatype_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_data_source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_id_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_metatype_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_data_source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub origin_parameters: Vec<EdgeConnectionParameter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destination_parameters: Vec<EdgeConnectionParameter>,
    #[serde(default)]
    pub config: TransformationConfig,
    #[serde(default)]
    pub archived: bool,
}

/// The static half of an edge endpoint, copied onto every edge a rule builds.
/// Each endpoint has an id key, parameter filters, or both.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EndpointTemplate<'a> {
    pub id_key: Option<&'a str>,
    pub metatype_id: Option<&'a str>,
    pub data_source_id: Option<&'a str>,
    pub parameters: &'a [EdgeConnectionParameter],
}

impl<'a> EndpointTemplate<'a> {
    pub fn by_id_key(id_key: &'a str) -> Self {
        Self {
            id_key: Some(id_key),
            metatype_id: None,
            data_source_id: None,
            parameters: &[],
        }
    }
}

/// Validated output target of a rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuleTarget<'a> {
    Node {
        metatype_id: &'a str,
    },
    Edge {
        relationship_pair_id: &'a str,
        origin: EndpointTemplate<'a>,
        destination: EndpointTemplate<'a>,
    },
}

impl TransformationRule {
    pub fn node(container_id: impl Into<String>, metatype_id: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            metatype_id: Some(metatype_id.into()),
            ..Default::default()
        }
    }

    pub fn edge(
        container_id: impl Into<String>,
        relationship_pair_id: impl Into<String>,
        origin_id_key: impl Into<String>,
        destination_id_key: impl Into<String>,
    ) -> Self {
        Self {
            container_id: container_id.into(),
            metatype_relationship_pair_id: Some(relationship_pair_id.into()),
            origin_id_key: Some(origin_id_key.into()),
            destination_id_key: Some(destination_id_key.into()),
            ..Default::default()
        }
    }

    /// Identifier used in logs and error lists.
    pub fn display_id(&self) -> &str {
        self.id
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("<unsaved>")
    }

    /// Resolves which kind of entity this rule produces, rejecting rules
    /// that name both targets or neither.
    pub fn target(&self) -> Result<RuleTarget<'_>, TransformationError> {
        match (
            self.metatype_id.as_deref(),
            self.metatype_relationship_pair_id.as_deref(),
        ) {
            (Some(_), Some(_)) => Err(TransformationError::Configuration(
                "transformation targets both a metatype and a relationship pair".to_string(),
            )),
            (Some(metatype_id), None) => Ok(RuleTarget::Node { metatype_id }),
            (None, Some(relationship_pair_id)) => {
                if self.origin_id_key.is_none() && self.origin_parameters.is_empty() {
                    return Err(TransformationError::Configuration(
                        "edge transformation needs origin_id_key or origin_parameters".to_string(),
                    ));
                }
                if self.destination_id_key.is_none() && self.destination_parameters.is_empty() {
                    return Err(TransformationError::Configuration(
                        "edge transformation needs destination_id_key or destination_parameters"
                            .to_string(),
                    ));
                }

                Ok(RuleTarget::Edge {
                    relationship_pair_id,
                    origin: EndpointTemplate {
                        id_key: self.origin_id_key.as_deref(),
                        metatype_id: self.origin_metatype_id.as_deref(),
                        data_source_id: self.origin_data_source_id.as_deref(),
                        parameters: &self.origin_parameters,
                    },
                    destination: EndpointTemplate {
                        id_key: self.destination_id_key.as_deref(),
                        metatype_id: self.destination_metatype_id.as_deref(),
                        data_source_id: self.destination_data_source_id.as_deref(),
                        parameters: &self.destination_parameters,
                    },
                })
            }
            (None, None) => Err(TransformationError::Configuration(
                "unable to generate either node or edge".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_deserializes_from_mapping_json() {
        let rule: TransformationRule = serde_json::from_value(json!({
            "container_id": "c1",
            "metatype_id": "car",
            "root_array": "car_maintenance.maintenance_entries",
            "conditions": [{
                "key": "car.name",
                "operator": "==",
                "value": "test car",
                "subexpressions": [{"expression": "OR", "key": "car.id", "operator": "exists", "value": ""}]
            }],
            "keys": [{"key": "car.id", "metatype_key_id": "k1", "value_type": "string"}],
            "config": {"on_conversion_error": "fail on required", "on_key_extraction_error": "ignore"}
        }))
        .unwrap();

        assert_eq!(rule.conditions[0].operator, Operator::Eq);
        assert_eq!(
            rule.conditions[0].subexpressions[0].expression,
            Some(Expression::Or)
        );
        assert_eq!(rule.keys[0].value_type, Some(DataType::String));
        assert_eq!(rule.config.on_conversion_error, ErrorAction::FailOnRequired);
        assert_eq!(rule.config.on_key_extraction_error, ErrorAction::Ignore);
        assert!(matches!(rule.target(), Ok(RuleTarget::Node { metatype_id: "car" })));
    }

    #[test]
    fn test_rule_with_both_targets_is_rejected() {
        let mut rule = TransformationRule::node("c1", "car");
        rule.metatype_relationship_pair_id = Some("pair".to_string());
        assert!(matches!(
            rule.target(),
            Err(TransformationError::Configuration(_))
        ));
    }

    #[test]
    fn test_rule_with_no_target_is_rejected() {
        let rule = TransformationRule {
            container_id: "c1".to_string(),
            ..Default::default()
        };
        let err = rule.target().unwrap_err();
        assert!(err.to_string().contains("unable to generate either node or edge"));
    }

    #[test]
    fn test_edge_rule_requires_endpoint_keys() {
        let mut rule = TransformationRule::edge("c1", "pair", "a.id", "b.id");
        assert!(matches!(rule.target(), Ok(RuleTarget::Edge { .. })));

        rule.destination_id_key = None;
        assert!(rule.target().is_err());

        rule.destination_parameters = vec![EdgeConnectionParameter::new(
            crate::domain::ParameterKind::MetatypeId,
            "part",
        )];
        let Ok(RuleTarget::Edge { destination, .. }) = rule.target() else {
            panic!("expected an edge target");
        };
        assert_eq!(destination.id_key, None);
        assert_eq!(destination.parameters.len(), 1);
    }
}
