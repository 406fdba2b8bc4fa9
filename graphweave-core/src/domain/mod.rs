//! Domain objects shared by the transformation engine, storage services and
//! the edge linker.

pub mod conversion;
pub mod edge;
pub mod node;
pub mod ontology;
pub mod staging;
pub mod transformation;

pub use conversion::Conversion;
pub use edge::{
    edge_insertion_cache_key, parameters_from_value, parameters_to_value, uses_parameters, Edge,
    EdgeConnectionParameter, EdgeQueueItem, ParameterKind,
};
pub use node::{EntityMetadata, Node, NodeIdentity};
pub use ontology::{DataType, KeyKind, OntologyKey};
pub use staging::DataStaging;
pub use transformation::{
    Condition, EndpointTemplate, ErrorAction, Expression, KeyMapping, Operator, RuleTarget,
    TransformationConfig, TransformationRule,
};
