//! Key mapping resolution: extraction, coercion and the error policies.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::domain::{
    Conversion, ErrorAction, KeyKind, KeyMapping, OntologyKey, TransformationConfig,
    TransformationRule,
};
use crate::errors::TransformationError;
use crate::transform::coercion::convert_value;
use crate::transform::payload::get_nested_value;

/// Ontology keys referenced by one rule, fetched before the rule is applied.
#[derive(Debug, Clone, Default)]
pub struct RuleKeys {
    metatype: HashMap<String, OntologyKey>,
    relationship: HashMap<String, OntologyKey>,
}

impl RuleKeys {
    pub fn insert(&mut self, kind: KeyKind, key: OntologyKey) {
        match kind {
            KeyKind::Metatype => self.metatype.insert(key.id.clone(), key),
            KeyKind::Relationship => self.relationship.insert(key.id.clone(), key),
        };
    }

    pub fn get(&self, kind: KeyKind, id: &str) -> Option<&OntologyKey> {
        match kind {
            KeyKind::Metatype => self.metatype.get(id),
            KeyKind::Relationship => self.relationship.get(id),
        }
    }

    pub fn len(&self) -> usize {
        self.metatype.len() + self.relationship.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of resolving one key mapping at one payload position.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyOutcome {
    Value {
        value: Value,
        conversion: Option<Conversion>,
    },
    Skip {
        failed: Option<Conversion>,
    },
    Fail {
        reason: String,
        failed: Option<Conversion>,
    },
}

/// Applies the extraction and conversion policies to one raw value.
///
/// A missing value under [`ErrorAction::Fail`] extraction is not fatal by
/// itself; it is handed to coercion, which always fails on it, and the
/// conversion policy decides.
pub fn resolve_key(
    key: &OntologyKey,
    mapping: &KeyMapping,
    raw: Option<&Value>,
    config: &TransformationConfig,
) -> KeyOutcome {
    if raw.is_none() {
        match config.on_key_extraction_error {
            ErrorAction::Ignore => return KeyOutcome::Skip { failed: None },
            ErrorAction::FailOnRequired if key.required => {
                return KeyOutcome::Fail {
                    reason: format!(
                        "unable to fetch data from payload for a required key '{}'",
                        key.property_name
                    ),
                    failed: None,
                }
            }
            ErrorAction::FailOnRequired => return KeyOutcome::Skip { failed: None },
            ErrorAction::Fail => {}
        }
    }

    let data_type = mapping.value_type.unwrap_or(key.data_type);
    let conversion = match convert_value(
        data_type,
        raw,
        mapping.date_conversion_format_string.as_deref(),
    ) {
        None => {
            return KeyOutcome::Value {
                value: raw.cloned().unwrap_or(Value::Null),
                conversion: None,
            }
        }
        Some(conversion) => conversion,
    };

    if !conversion.is_failure() {
        return KeyOutcome::Value {
            value: conversion.converted_value.clone().unwrap_or(Value::Null),
            conversion: Some(conversion),
        };
    }

    let reason = conversion.errors.clone().unwrap_or_default();
    match config.on_conversion_error {
        ErrorAction::Ignore => KeyOutcome::Skip {
            failed: Some(conversion),
        },
        ErrorAction::FailOnRequired if !key.required => KeyOutcome::Skip {
            failed: Some(conversion),
        },
        ErrorAction::FailOnRequired | ErrorAction::Fail => KeyOutcome::Fail {
            reason,
            failed: Some(conversion),
        },
    }
}

/// Properties and conversion audit produced by one rule at one position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedKeys {
    pub node_properties: Map<String, Value>,
    pub edge_properties: Map<String, Value>,
    pub conversions: Vec<Conversion>,
    pub failed_conversions: Vec<Conversion>,
}

impl ResolvedKeys {
    fn properties_mut(&mut self, kind: KeyKind) -> &mut Map<String, Value> {
        match kind {
            KeyKind::Metatype => &mut self.node_properties,
            KeyKind::Relationship => &mut self.edge_properties,
        }
    }
}

/// Resolves every key mapping of `rule` against the payload position `index`.
///
/// Mappings whose ontology key is absent from `keys` are skipped. The
/// engine's prefetch already rejects rules with unknown relationship keys.
pub fn resolve_keys(
    rule: &TransformationRule,
    keys: &RuleKeys,
    payload: &Value,
    index: &[usize],
) -> Result<ResolvedKeys, TransformationError> {
    let mut resolved = ResolvedKeys::default();

    for mapping in &rule.keys {
        if let Some(id) = mapping.metatype_key_id.as_deref() {
            resolve_mapping(KeyKind::Metatype, id, mapping, rule, keys, payload, index, &mut resolved)?;
        }
        if let Some(id) = mapping.metatype_relationship_key_id.as_deref() {
            resolve_mapping(KeyKind::Relationship, id, mapping, rule, keys, payload, index, &mut resolved)?;
        }
    }

    Ok(resolved)
}

#[allow(clippy::too_many_arguments)]
fn resolve_mapping(
    kind: KeyKind,
    key_id: &str,
    mapping: &KeyMapping,
    rule: &TransformationRule,
    keys: &RuleKeys,
    payload: &Value,
    index: &[usize],
    resolved: &mut ResolvedKeys,
) -> Result<(), TransformationError> {
    let Some(key) = keys.get(kind, key_id) else {
        return Ok(());
    };

    if let Some(literal) = &mapping.value {
        resolved
            .properties_mut(kind)
            .insert(key.property_name.clone(), literal.clone());
    }

    let Some(path) = mapping.key.as_deref() else {
        return Ok(());
    };

    let raw = get_nested_value(path, payload, index);
    match resolve_key(key, mapping, raw, &rule.config) {
        KeyOutcome::Value { value, conversion } => {
            resolved
                .properties_mut(kind)
                .insert(key.property_name.clone(), value);
            resolved.conversions.extend(conversion);
        }
        KeyOutcome::Skip { failed } => {
            resolved.failed_conversions.extend(failed);
        }
        KeyOutcome::Fail { reason, failed } => {
            return Err(match failed {
                Some(_) => TransformationError::Conversion {
                    property: key.property_name.clone(),
                    reason,
                },
                None => TransformationError::KeyExtraction {
                    property: key.property_name.clone(),
                },
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DataType;
    use serde_json::json;

    fn key(required: bool) -> OntologyKey {
        OntologyKey::new("k1", "visits", DataType::Number, required)
    }

    fn config(extraction: ErrorAction, conversion: ErrorAction) -> TransformationConfig {
        TransformationConfig {
            on_conversion_error: conversion,
            on_key_extraction_error: extraction,
        }
    }

    #[test]
    fn test_missing_value_policies() {
        let mapping = KeyMapping::metatype("car.visits", "k1");
        let ignore = config(ErrorAction::Ignore, ErrorAction::Ignore);
        assert_eq!(
            resolve_key(&key(true), &mapping, None, &ignore),
            KeyOutcome::Skip { failed: None }
        );

        let on_required = config(ErrorAction::FailOnRequired, ErrorAction::Ignore);
        assert!(matches!(
            resolve_key(&key(true), &mapping, None, &on_required),
            KeyOutcome::Fail { failed: None, .. }
        ));
        assert_eq!(
            resolve_key(&key(false), &mapping, None, &on_required),
            KeyOutcome::Skip { failed: None }
        );
    }

    #[test]
    fn test_fail_extraction_degrades_into_conversion_failure() {
        let mapping = KeyMapping::metatype("car.visits", "k1");
        let outcome = resolve_key(
            &key(true),
            &mapping,
            None,
            &config(ErrorAction::Fail, ErrorAction::Ignore),
        );
        match outcome {
            KeyOutcome::Skip { failed: Some(conversion) } => {
                assert!(conversion.is_failure());
                assert_eq!(conversion.original_value, None);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_conversion_outcomes() {
        let mapping = KeyMapping::metatype("car.visits", "k1");
        let cfg = config(ErrorAction::Ignore, ErrorAction::FailOnRequired);

        assert_eq!(
            resolve_key(&key(true), &mapping, Some(&json!(4)), &cfg),
            KeyOutcome::Value {
                value: json!(4),
                conversion: None
            }
        );

        match resolve_key(&key(true), &mapping, Some(&json!("4")), &cfg) {
            KeyOutcome::Value {
                value,
                conversion: Some(conversion),
            } => {
                assert_eq!(value, json!(4));
                assert_eq!(conversion.original_value, Some(json!("4")));
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        assert!(matches!(
            resolve_key(&key(true), &mapping, Some(&json!("many")), &cfg),
            KeyOutcome::Fail { failed: Some(_), .. }
        ));
        assert!(matches!(
            resolve_key(&key(false), &mapping, Some(&json!("many")), &cfg),
            KeyOutcome::Skip { failed: Some(_) }
        ));
    }

    #[test]
    fn test_value_type_override() {
        let mapping = KeyMapping::metatype("car.visits", "k1").with_value_type(DataType::String);
        let cfg = TransformationConfig::default();
        assert_eq!(
            resolve_key(&key(true), &mapping, Some(&json!(4)), &cfg),
            KeyOutcome::Value {
                value: json!("4"),
                conversion: Some(Conversion::success(Some(json!(4)), json!("4")))
            }
        );
    }

    #[test]
    fn test_literal_is_overridden_by_extracted_value() {
        let mut keys = RuleKeys::default();
        keys.insert(
            KeyKind::Metatype,
            OntologyKey::new("k1", "name", DataType::String, false),
        );
        keys.insert(
            KeyKind::Metatype,
            OntologyKey::new("k2", "source", DataType::String, false),
        );

        let mut rule = TransformationRule::node("c1", "car");
        rule.config.on_key_extraction_error = ErrorAction::Ignore;
        rule.keys = vec![
            KeyMapping::metatype("car.name", "k1").with_literal("fallback"),
            KeyMapping::metatype("car.source", "k2").with_literal("import"),
            KeyMapping::metatype("car.name", "missing-key"),
        ];

        let resolved = resolve_keys(&rule, &keys, &json!({"car": {"name": "test car"}}), &[]).unwrap();
        assert_eq!(resolved.node_properties.get("name"), Some(&json!("test car")));
        assert_eq!(resolved.node_properties.get("source"), Some(&json!("import")));
        assert_eq!(resolved.node_properties.len(), 2);
        assert!(resolved.edge_properties.is_empty());
    }
}
