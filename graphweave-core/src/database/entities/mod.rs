pub mod data_staging;
pub mod edge_resolution_failures;
pub mod edges;
pub mod nodes;
pub mod ontology_keys;
pub mod queue_messages;
pub mod type_transformations;
