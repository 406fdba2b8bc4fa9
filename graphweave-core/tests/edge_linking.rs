mod common;

use std::sync::Arc;
use std::time::Duration;

use graphweave::cache::{Cache, MemoryCache};
use graphweave::database::entities::{edge_resolution_failures, edges};
use graphweave::domain::{
    Edge, EdgeConnectionParameter, EdgeQueueItem, EntityMetadata, Node, ParameterKind,
};
use graphweave::errors::LinkerError;
use graphweave::queue::{MemoryQueue, Queue, QueueMessage};
use graphweave::services::{
    EdgeLinker, EdgeQueueConsumer, EdgeQueueProducer, EdgeService, LinkOutcome, LinkState,
    NodeService,
};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde_json::Map;
use uuid::Uuid;

use common::setup_db;

const TOPIC: &str = "edge_insertion";

fn node(metatype_id: &str, original_id: &str) -> Node {
    Node {
        id: None,
        container_id: "c1".to_string(),
        metatype_id: metatype_id.to_string(),
        properties: Map::new(),
        original_data_id: Some(original_id.to_string()),
        data_source_id: "ds1".to_string(),
        import_data_id: None,
        data_staging_id: None,
        type_mapping_transformation_id: None,
        metadata: EntityMetadata::default(),
        created_at: None,
    }
}

fn car_manufacturer_edge() -> Edge {
    Edge {
        id: None,
        container_id: "c1".to_string(),
        metatype_relationship_pair_id: "car_manufacturer".to_string(),
        data_source_id: "ds1".to_string(),
        properties: Map::new(),
        origin_id: None,
        destination_id: None,
        origin_original_id: Some("UUID".to_string()),
        origin_metatype_id: Some("car".to_string()),
        origin_data_source_id: None,
        destination_original_id: Some("MFR-1".to_string()),
        destination_metatype_id: Some("manufacturer".to_string()),
        destination_data_source_id: None,
        origin_parameters: Vec::new(),
        destination_parameters: Vec::new(),
        import_data_id: None,
        data_staging_id: None,
        type_mapping_transformation_id: None,
        metadata: EntityMetadata::default(),
        created_at: None,
    }
}

/// Links the car to every part, selected by filters rather than ids.
fn car_parts_template() -> Edge {
    Edge {
        metatype_relationship_pair_id: "car_part".to_string(),
        origin_original_id: None,
        destination_original_id: None,
        origin_metatype_id: None,
        destination_metatype_id: None,
        origin_parameters: vec![
            EdgeConnectionParameter::new(ParameterKind::MetatypeId, "car"),
            EdgeConnectionParameter::new(ParameterKind::OriginalId, "UUID"),
        ],
        destination_parameters: vec![EdgeConnectionParameter::new(ParameterKind::MetatypeId, "part")],
        ..car_manufacturer_edge()
    }
}

async fn insert_template(db: &DatabaseConnection) -> Uuid {
    EdgeService::new(db.clone())
        .insert_edges(vec![car_parts_template()])
        .await
        .unwrap()[0]
        .id
}

async fn insert_edge(db: &DatabaseConnection) -> Uuid {
    let stored = EdgeService::new(db.clone())
        .insert_edges(vec![car_manufacturer_edge()])
        .await
        .unwrap();
    stored[0].id
}

async fn insert_endpoints(db: &DatabaseConnection) {
    NodeService::new(db.clone())
        .upsert_nodes(vec![node("car", "UUID"), node("manufacturer", "MFR-1")])
        .await
        .unwrap();
}

struct Harness {
    db: DatabaseConnection,
    queue: Arc<MemoryQueue>,
    cache: Arc<MemoryCache>,
    producer: Arc<EdgeQueueProducer>,
    consumer: EdgeQueueConsumer,
}

async fn harness(max_retries: u32) -> Harness {
    let db = setup_db().await;
    let queue = Arc::new(MemoryQueue::new());
    let cache = Arc::new(MemoryCache::new());
    let producer = Arc::new(EdgeQueueProducer::new(
        queue.clone(),
        cache.clone(),
        TOPIC,
        Duration::from_secs(60),
    ));
    let linker = Arc::new(EdgeLinker::new(db.clone(), 100));
    let consumer = EdgeQueueConsumer::new(
        db.clone(),
        linker,
        producer.clone(),
        Duration::from_secs(5),
        max_retries,
    );
    Harness {
        db,
        queue,
        cache,
        producer,
        consumer,
    }
}

#[tokio::test]
async fn test_batch_pass_resolves_edge_once_nodes_exist() {
    let db = setup_db().await;
    let edge_id = insert_edge(&db).await;
    let linker = EdgeLinker::new(db.clone(), 100);

    let report = linker.link_orphaned_edges(None).await.unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.still_orphaned, 1);
    let edge = EdgeService::new(db.clone()).get(edge_id).await.unwrap().unwrap();
    assert!(edge.origin_id.is_none());

    insert_endpoints(&db).await;
    let report = linker.link_orphaned_edges(Some("c1")).await.unwrap();
    assert_eq!(report.resolved, 1);

    let edge = EdgeService::new(db.clone()).get(edge_id).await.unwrap().unwrap();
    let car = NodeService::new(db.clone())
        .find_endpoint("c1", "ds1", Some("car"), "UUID")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(edge.origin_id, Some(car.id));
    assert!(edge.destination_id.is_some());

    let report = linker.link_orphaned_edges(None).await.unwrap();
    assert_eq!(report.scanned, 0);
    let unchanged = EdgeService::new(db.clone()).get(edge_id).await.unwrap().unwrap();
    assert_eq!(unchanged, edge);
}

#[tokio::test]
async fn test_batch_pass_fills_one_endpoint_at_a_time() {
    let db = setup_db().await;
    let edge_id = insert_edge(&db).await;
    NodeService::new(db.clone())
        .upsert_nodes(vec![node("car", "UUID")])
        .await
        .unwrap();
    let linker = EdgeLinker::new(db.clone(), 1);

    assert_eq!(linker.resolve_edge(edge_id).await.unwrap(), LinkState::Orphaned);
    let edge = EdgeService::new(db.clone()).get(edge_id).await.unwrap().unwrap();
    assert!(edge.origin_id.is_some());
    assert!(edge.destination_id.is_none());
    assert_eq!(
        EdgeService::new(db.clone()).count_orphaned(Some("c1")).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn test_batch_pass_pages_through_every_orphan() {
    let db = setup_db().await;
    for _ in 0..5 {
        insert_edge(&db).await;
    }
    insert_endpoints(&db).await;

    let report = EdgeLinker::new(db.clone(), 2)
        .link_orphaned_edges(None)
        .await
        .unwrap();

    assert_eq!(report.scanned, 5);
    assert_eq!(report.resolved, 5);
    assert_eq!(EdgeService::new(db).count_orphaned(None).await.unwrap(), 0);
}

#[tokio::test]
async fn test_enqueue_is_deduplicated_while_outstanding() {
    let h = harness(3).await;
    let edge_id = insert_edge(&h.db).await;

    assert!(h.producer.enqueue(EdgeQueueItem::new(edge_id, "c1")).await.unwrap());
    assert!(!h.producer.enqueue(EdgeQueueItem::new(edge_id, "c1")).await.unwrap());
    assert_eq!(h.queue.pending(TOPIC).await.unwrap(), 1);
}

#[tokio::test]
async fn test_consumer_resolves_and_releases_dedup_key() {
    let h = harness(3).await;
    let edge_id = insert_edge(&h.db).await;
    insert_endpoints(&h.db).await;
    let item = EdgeQueueItem::new(edge_id, "c1");
    h.producer.enqueue(item.clone()).await.unwrap();

    let message = h.queue.poll(TOPIC).await.unwrap().unwrap();
    let outcome = h.consumer.handle_message(&message).await.unwrap();

    assert_eq!(outcome, LinkOutcome::Resolved);
    assert!(h.cache.get(&item.cache_key()).await.unwrap().is_none());
    let edge = EdgeService::new(h.db.clone()).get(edge_id).await.unwrap().unwrap();
    assert!(edge.is_resolved());
}

#[tokio::test]
async fn test_consumer_requeues_with_linear_backoff() {
    let h = harness(3).await;
    let edge_id = insert_edge(&h.db).await;
    h.producer
        .enqueue(EdgeQueueItem::new(edge_id, "c1"))
        .await
        .unwrap();

    let message = h.queue.poll(TOPIC).await.unwrap().unwrap();
    let outcome = h.consumer.handle_message(&message).await.unwrap();
    assert_eq!(
        outcome,
        LinkOutcome::Retrying {
            attempt: 1,
            delay: Duration::from_secs(5)
        }
    );

    // The retry is delayed, so it is pending but not yet pollable
    assert!(h.queue.poll(TOPIC).await.unwrap().is_none());
    let pending = h.queue.peek_all(TOPIC);
    assert_eq!(pending.len(), 1);
    let retried: EdgeQueueItem = pending[0].decode().unwrap();
    assert_eq!(retried.attempts, 1);
    assert!(retried.last_attempt.is_some());

    let mut second = retried;
    second.attempts = 2;
    let outcome = h.consumer.handle_item(second).await.unwrap();
    assert_eq!(
        outcome,
        LinkOutcome::Retrying {
            attempt: 3,
            delay: Duration::from_secs(15)
        }
    );
}

#[tokio::test]
async fn test_consumer_abandons_after_max_retries() {
    let h = harness(2).await;
    let edge_id = insert_edge(&h.db).await;
    let mut item = EdgeQueueItem::new(edge_id, "c1");
    item.attempts = 2;
    h.cache
        .set(&item.cache_key(), "2", Duration::from_secs(60))
        .await
        .unwrap();

    let outcome = h.consumer.handle_item(item.clone()).await.unwrap();

    assert_eq!(outcome, LinkOutcome::Abandoned { attempts: 3 });
    assert_eq!(h.queue.pending(TOPIC).await.unwrap(), 0);
    assert!(h.cache.get(&item.cache_key()).await.unwrap().is_none());

    let failures = edge_resolution_failures::Entity::find()
        .all(&h.db)
        .await
        .unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].edge_id, edge_id);
    assert_eq!(failures[0].attempts, 3);
    assert_eq!(failures[0].container_id, "c1");

    // A fresh attempt is allowed once the key is released
    assert!(h.producer.enqueue(EdgeQueueItem::new(edge_id, "c1")).await.unwrap());
}

#[tokio::test]
async fn test_consumer_drops_items_for_missing_edges() {
    let h = harness(3).await;
    let item = EdgeQueueItem::new(Uuid::new_v4(), "c1");

    let outcome = h.consumer.handle_item(item).await.unwrap();
    assert_eq!(outcome, LinkOutcome::Dropped);
}

#[tokio::test]
async fn test_consumer_rejects_malformed_messages() {
    let h = harness(3).await;
    let message = QueueMessage::new(serde_json::json!({"unexpected": true}));

    let err = h.consumer.handle_message(&message).await.unwrap_err();
    assert!(matches!(err, LinkerError::InvalidQueueItem(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_batch_pass_and_consumer_resolve_same_edge_concurrently() {
    let h = harness(3).await;
    let edge_id = insert_edge(&h.db).await;
    insert_endpoints(&h.db).await;
    let item = EdgeQueueItem::new(edge_id, "c1");
    h.producer.enqueue(item.clone()).await.unwrap();
    let message = h.queue.poll(TOPIC).await.unwrap().unwrap();
    let linker = EdgeLinker::new(h.db.clone(), 100);

    let (report, outcome) = tokio::join!(
        linker.link_orphaned_edges(None),
        h.consumer.handle_message(&message)
    );

    assert!(report.unwrap().scanned <= 1);
    assert_eq!(outcome.unwrap(), LinkOutcome::Resolved);
    let car = NodeService::new(h.db.clone())
        .find_endpoint("c1", "ds1", Some("car"), "UUID")
        .await
        .unwrap()
        .unwrap();
    let edge = EdgeService::new(h.db.clone()).get(edge_id).await.unwrap().unwrap();
    assert_eq!(edge.origin_id, Some(car.id));
    assert!(edge.is_resolved());
    assert_eq!(EdgeService::new(h.db.clone()).count_orphaned(None).await.unwrap(), 0);
    assert!(h.cache.get(&item.cache_key()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_skipped_enqueue_rewrites_dedup_key() {
    let h = harness(3).await;
    let edge_id = insert_edge(&h.db).await;
    let item = EdgeQueueItem::new(edge_id, "c1");
    h.cache
        .set(&item.cache_key(), "0", Duration::from_millis(50))
        .await
        .unwrap();

    assert!(!h.producer.enqueue(item.clone()).await.unwrap());
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(h.cache.get(&item.cache_key()).await.unwrap().as_deref(), Some("0"));
    assert_eq!(h.queue.pending(TOPIC).await.unwrap(), 0);
}

#[tokio::test]
async fn test_parameterized_edge_expands_into_matching_pairs() {
    let db = setup_db().await;
    let template_id = insert_template(&db).await;
    let nodes = NodeService::new(db.clone());
    nodes.upsert_nodes(vec![node("car", "UUID")]).await.unwrap();
    let linker = EdgeLinker::new(db.clone(), 100);

    // No part exists yet, so the template waits
    assert_eq!(linker.resolve_edge(template_id).await.unwrap(), LinkState::Orphaned);

    nodes
        .upsert_nodes(vec![node("part", "oil"), node("part", "pan"), node("manufacturer", "MFR-1")])
        .await
        .unwrap();
    let report = linker.link_orphaned_edges(Some("c1")).await.unwrap();
    assert_eq!(report.resolved, 1);

    let car = nodes.find_endpoint("c1", "ds1", Some("car"), "UUID").await.unwrap().unwrap();
    let stored = edges::Entity::find().all(&db).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|edge| edge.is_resolved()));
    assert!(stored.iter().all(|edge| edge.origin_id == Some(car.id)));
    assert!(stored.iter().all(|edge| edge.origin_parameters.is_none()));
    assert!(stored.iter().all(|edge| edge.metatype_relationship_pair_id == "car_part"));
    assert!(EdgeService::new(db.clone()).get(template_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_parameterized_edge_is_expanded_once_under_concurrency() {
    let db = setup_db().await;
    let template_id = insert_template(&db).await;
    NodeService::new(db.clone())
        .upsert_nodes(vec![node("car", "UUID"), node("part", "oil"), node("part", "pan")])
        .await
        .unwrap();
    let first = EdgeLinker::new(db.clone(), 100);
    let second = EdgeLinker::new(db.clone(), 100);

    let (a, b) = tokio::join!(first.resolve_edge(template_id), second.resolve_edge(template_id));

    for result in [a, b] {
        match result {
            Ok(state) => assert_eq!(state, LinkState::Resolved),
            Err(err) => assert!(matches!(err, LinkerError::EdgeNotFound(id) if id == template_id)),
        }
    }
    assert_eq!(edges::Entity::find().all(&db).await.unwrap().len(), 2);
}
