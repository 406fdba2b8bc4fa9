//! Type transformation engine.
//!
//! Applies a [`TransformationRule`] to a staged payload: the payload walker
//! expands `root_array` into leaf positions, conditions gate each position,
//! key mappings are extracted and coerced, and the entity builder emits one
//! node or edge per surviving position.

pub mod builder;
pub mod coercion;
pub mod condition;
pub mod keys;
pub mod payload;
pub mod value;

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::domain::{DataStaging, Edge, KeyKind, Node, RuleTarget, TransformationRule};
use crate::errors::TransformationError;
use crate::ontology::KeyLookup;

pub use builder::EntityBuilder;
pub use coercion::convert_value;
pub use condition::{is_satisfied, rule_matches};
pub use keys::{resolve_key, resolve_keys, KeyOutcome, ResolvedKeys, RuleKeys};
pub use payload::{get_nested_value, IndexPath, RootArray};

/// Entities produced by one rule application. A rule only ever targets one
/// kind of entity.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformationOutput {
    Nodes(Vec<Node>),
    Edges(Vec<Edge>),
}

impl TransformationOutput {
    pub fn len(&self) -> usize {
        match self {
            TransformationOutput::Nodes(nodes) => nodes.len(),
            TransformationOutput::Edges(edges) => edges.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn nodes(&self) -> &[Node] {
        match self {
            TransformationOutput::Nodes(nodes) => nodes,
            TransformationOutput::Edges(_) => &[],
        }
    }

    pub fn edges(&self) -> &[Edge] {
        match self {
            TransformationOutput::Nodes(_) => &[],
            TransformationOutput::Edges(edges) => edges,
        }
    }
}

pub struct TransformationEngine {
    keys: Arc<dyn KeyLookup>,
}

impl TransformationEngine {
    pub fn new(keys: Arc<dyn KeyLookup>) -> Self {
        Self { keys }
    }

    /// Applies `rule` to `staging`.
    ///
    /// Without a `root_array` a key or conversion failure fails the record.
    /// With one, failures at a single leaf are logged and that leaf skipped;
    /// only a missing top-level array fails the record.
    #[instrument(skip_all, fields(rule = %rule.display_id(), staging_id = %staging.id))]
    pub async fn apply(
        &self,
        rule: &TransformationRule,
        staging: &DataStaging,
    ) -> Result<TransformationOutput, TransformationError> {
        rule.target()?;
        let keys = self.prefetch_keys(rule).await?;
        apply_with_keys(rule, &keys, staging)
    }

    /// Looks up every ontology key the rule references, once. A missing
    /// metatype key only drops its mapping; a missing relationship key fails
    /// the rule.
    pub async fn prefetch_keys(
        &self,
        rule: &TransformationRule,
    ) -> Result<RuleKeys, TransformationError> {
        let mut keys = RuleKeys::default();

        for mapping in &rule.keys {
            if let Some(id) = mapping.metatype_key_id.as_deref() {
                if keys.get(KeyKind::Metatype, id).is_none() {
                    match self.keys.metatype_key(id).await? {
                        Some(key) => keys.insert(KeyKind::Metatype, key),
                        None => warn!(
                            "unable to fetch keys to map payload, metatype key {} does not exist",
                            id
                        ),
                    }
                }
            }
            if let Some(id) = mapping.metatype_relationship_key_id.as_deref() {
                if keys.get(KeyKind::Relationship, id).is_none() {
                    match self.keys.relationship_key(id).await? {
                        Some(key) => keys.insert(KeyKind::Relationship, key),
                        None => {
                            return Err(TransformationError::MissingRelationshipKey {
                                key_id: id.to_string(),
                            })
                        }
                    }
                }
            }
        }

        Ok(keys)
    }
}

/// Synchronous core of [`TransformationEngine::apply`] over prefetched keys.
pub fn apply_with_keys(
    rule: &TransformationRule,
    keys: &RuleKeys,
    staging: &DataStaging,
) -> Result<TransformationOutput, TransformationError> {
    let target = rule.target()?;
    let builder = EntityBuilder::new(rule, staging);

    let root_array = rule.root_array.as_deref().filter(|expression| !expression.is_empty());
    let positions: Vec<IndexPath> = match root_array {
        Some(expression) => RootArray::parse(expression).expand(&staging.data)?,
        None => vec![Vec::new()],
    };

    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    for index in positions {
        if !rule_matches(&rule.conditions, &staging.data, &index) {
            debug!("conditions not met at index {:?}", index);
            continue;
        }

        let resolved = match resolve_keys(rule, keys, &staging.data, &index) {
            Ok(resolved) => resolved,
            Err(err) if root_array.is_some() => {
                warn!(
                    "unable to apply transformation {} at index {:?}: {}",
                    rule.display_id(),
                    index,
                    err
                );
                continue;
            }
            Err(err) => return Err(err),
        };

        match target {
            RuleTarget::Node { metatype_id } => {
                nodes.push(builder.node(metatype_id, resolved, &index));
            }
            RuleTarget::Edge {
                relationship_pair_id,
                origin,
                destination,
            } => {
                edges.push(builder.edge(relationship_pair_id, origin, destination, resolved, &index));
            }
        }
    }

    Ok(match target {
        RuleTarget::Node { .. } => TransformationOutput::Nodes(nodes),
        RuleTarget::Edge { .. } => TransformationOutput::Edges(edges),
    })
}
