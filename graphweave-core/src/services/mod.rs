pub mod edge_linker;
pub mod edge_service;
pub mod node_service;
pub mod processing_service;
pub mod staging_service;
pub mod transformation_repository;

pub use edge_linker::{
    EdgeLinker, EdgeQueueConsumer, EdgeQueueProducer, LinkOutcome, LinkReport, LinkState,
};
pub use edge_service::EdgeService;
pub use node_service::NodeService;
pub use processing_service::{ProcessingService, RecordReport, SourceReport};
pub use staging_service::StagingService;
pub use transformation_repository::TransformationRepository;
