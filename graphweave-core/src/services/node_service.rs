use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::database::entities::nodes;
use crate::domain::{EdgeConnectionParameter, Node, NodeIdentity, ParameterKind};
use crate::transform::value::stringify;

pub struct NodeService {
    db: DatabaseConnection,
}

impl NodeService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates or updates nodes by composite identity, returning the stored
    /// rows in input order. Nodes without an original id are always inserted.
    #[instrument(skip(self, nodes), fields(count = nodes.len()))]
    pub async fn upsert_nodes(&self, nodes: Vec<Node>) -> Result<Vec<nodes::Model>, sea_orm::DbErr> {
        let txn = self.db.begin().await?;
        let stored = Self::upsert_all(&txn, nodes).await?;
        txn.commit().await?;
        debug!("Upserted {} nodes", stored.len());
        Ok(stored)
    }

    /// Upserts on `conn` so callers can fold the write into their own
    /// transaction.
    pub async fn upsert_all<C>(conn: &C, nodes: Vec<Node>) -> Result<Vec<nodes::Model>, sea_orm::DbErr>
    where
        C: ConnectionTrait,
    {
        let mut stored = Vec::with_capacity(nodes.len());
        for node in nodes {
            stored.push(Self::upsert_one(conn, node).await?);
        }
        Ok(stored)
    }

    async fn upsert_one<C>(conn: &C, node: Node) -> Result<nodes::Model, sea_orm::DbErr>
    where
        C: ConnectionTrait,
    {
        let now = Utc::now();
        let id = node.id.unwrap_or_else(Uuid::new_v4);
        let identity = node.identity();

        let active = nodes::ActiveModel {
            id: Set(id),
            container_id: Set(node.container_id),
            metatype_id: Set(node.metatype_id),
            data_source_id: Set(node.data_source_id),
            original_data_id: Set(node.original_data_id),
            properties: Set(serde_json::Value::Object(node.properties)),
            metadata: Set(node.metadata.to_value()),
            import_data_id: Set(node.import_data_id),
            data_staging_id: Set(node.data_staging_id),
            type_mapping_transformation_id: Set(node.type_mapping_transformation_id),
            created_at: Set(node.created_at.unwrap_or(now)),
            modified_at: Set(now),
        };

        nodes::Entity::insert(active)
            .on_conflict(
                OnConflict::columns([
                    nodes::Column::ContainerId,
                    nodes::Column::MetatypeId,
                    nodes::Column::DataSourceId,
                    nodes::Column::OriginalDataId,
                ])
                .update_columns([
                    nodes::Column::Properties,
                    nodes::Column::Metadata,
                    nodes::Column::ImportDataId,
                    nodes::Column::DataStagingId,
                    nodes::Column::TypeMappingTransformationId,
                    nodes::Column::ModifiedAt,
                ])
                .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;

        let found = match identity.original_data_id.as_deref() {
            Some(_) => Self::find_by_identity_in(conn, &identity).await?,
            None => nodes::Entity::find_by_id(id).one(conn).await?,
        };
        found.ok_or_else(|| sea_orm::DbErr::RecordNotFound(format!("node {}", id)))
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<nodes::Model>, sea_orm::DbErr> {
        nodes::Entity::find_by_id(id).one(&self.db).await
    }

    pub async fn find_by_identity(
        &self,
        identity: &NodeIdentity,
    ) -> Result<Option<nodes::Model>, sea_orm::DbErr> {
        Self::find_by_identity_in(&self.db, identity).await
    }

    async fn find_by_identity_in<C>(
        conn: &C,
        identity: &NodeIdentity,
    ) -> Result<Option<nodes::Model>, sea_orm::DbErr>
    where
        C: ConnectionTrait,
    {
        let mut query = nodes::Entity::find()
            .filter(nodes::Column::ContainerId.eq(identity.container_id.as_str()))
            .filter(nodes::Column::MetatypeId.eq(identity.metatype_id.as_str()))
            .filter(nodes::Column::DataSourceId.eq(identity.data_source_id.as_str()));
        query = match identity.original_data_id.as_deref() {
            Some(original_id) => query.filter(nodes::Column::OriginalDataId.eq(original_id)),
            None => query.filter(nodes::Column::OriginalDataId.is_null()),
        };
        query.one(conn).await
    }

    /// Endpoint lookup for the edge linker. The metatype narrows the match
    /// only when the edge recorded one.
    pub async fn find_endpoint(
        &self,
        container_id: &str,
        data_source_id: &str,
        metatype_id: Option<&str>,
        original_data_id: &str,
    ) -> Result<Option<nodes::Model>, sea_orm::DbErr> {
        let mut query = nodes::Entity::find()
            .filter(nodes::Column::ContainerId.eq(container_id))
            .filter(nodes::Column::DataSourceId.eq(data_source_id))
            .filter(nodes::Column::OriginalDataId.eq(original_data_id));
        if let Some(metatype_id) = metatype_id {
            query = query.filter(nodes::Column::MetatypeId.eq(metatype_id));
        }
        query.order_by_asc(nodes::Column::CreatedAt).one(&self.db).await
    }

    /// Nodes of a container matching every parameter by equality. A
    /// parameter without a value matches nothing. Property filters compare
    /// the stringified property against the stringified value.
    pub async fn find_by_parameters(
        &self,
        container_id: &str,
        parameters: &[EdgeConnectionParameter],
    ) -> Result<Vec<nodes::Model>, sea_orm::DbErr> {
        let mut query = nodes::Entity::find().filter(nodes::Column::ContainerId.eq(container_id));
        let mut property_filters = Vec::new();

        for parameter in parameters {
            let Some(value) = parameter.value.as_ref() else {
                return Ok(Vec::new());
            };
            let text = stringify(value);
            query = match parameter.kind {
                ParameterKind::DataSource => query.filter(nodes::Column::DataSourceId.eq(text)),
                ParameterKind::MetatypeId => query.filter(nodes::Column::MetatypeId.eq(text)),
                ParameterKind::OriginalId => query.filter(nodes::Column::OriginalDataId.eq(text)),
                ParameterKind::Id => match Uuid::parse_str(&text) {
                    Ok(id) => query.filter(nodes::Column::Id.eq(id)),
                    Err(_) => return Ok(Vec::new()),
                },
                ParameterKind::Property => match parameter.property.as_deref() {
                    Some(property) => {
                        property_filters.push((property, text));
                        query
                    }
                    None => return Ok(Vec::new()),
                },
            };
        }

        let candidates = query.order_by_asc(nodes::Column::CreatedAt).all(&self.db).await?;
        Ok(candidates
            .into_iter()
            .filter(|node| {
                property_filters.iter().all(|(property, expected)| {
                    node.properties
                        .get(*property)
                        .map(|actual| stringify(actual) == *expected)
                        .unwrap_or(false)
                })
            })
            .collect())
    }

    pub async fn list_by_container(
        &self,
        container_id: &str,
    ) -> Result<Vec<nodes::Model>, sea_orm::DbErr> {
        nodes::Entity::find()
            .filter(nodes::Column::ContainerId.eq(container_id))
            .order_by_asc(nodes::Column::CreatedAt)
            .all(&self.db)
            .await
    }

    pub async fn count_by_container(&self, container_id: &str) -> Result<u64, sea_orm::DbErr> {
        nodes::Entity::find()
            .filter(nodes::Column::ContainerId.eq(container_id))
            .count(&self.db)
            .await
    }
}
