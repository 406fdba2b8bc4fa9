use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::database::entities::edges;
use crate::domain::{parameters_to_value, Edge};

pub struct EdgeService {
    db: DatabaseConnection,
}

impl EdgeService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, edges), fields(count = edges.len()))]
    pub async fn insert_edges(&self, edges: Vec<Edge>) -> Result<Vec<edges::Model>, sea_orm::DbErr> {
        let txn = self.db.begin().await?;
        let stored = Self::insert_all(&txn, edges).await?;
        txn.commit().await?;
        debug!("Inserted {} edges", stored.len());
        Ok(stored)
    }

    /// Inserts on `conn` so callers can fold the write into their own
    /// transaction.
    pub async fn insert_all<C>(conn: &C, edges: Vec<Edge>) -> Result<Vec<edges::Model>, sea_orm::DbErr>
    where
        C: ConnectionTrait,
    {
        let now = Utc::now();
        let mut stored = Vec::with_capacity(edges.len());
        for edge in edges {
            let active = Self::active_model(edge, now);
            stored.push(edges::Entity::insert(active).exec_with_returning(conn).await?);
        }
        Ok(stored)
    }

    fn active_model(edge: Edge, now: chrono::DateTime<Utc>) -> edges::ActiveModel {
        edges::ActiveModel {
            id: Set(edge.id.unwrap_or_else(Uuid::new_v4)),
            origin_parameters: Set(parameters_to_value(&edge.origin_parameters)),
            destination_parameters: Set(parameters_to_value(&edge.destination_parameters)),
            container_id: Set(edge.container_id),
            metatype_relationship_pair_id: Set(edge.metatype_relationship_pair_id),
            data_source_id: Set(edge.data_source_id),
            properties: Set(serde_json::Value::Object(edge.properties)),
            origin_id: Set(edge.origin_id),
            destination_id: Set(edge.destination_id),
            origin_original_id: Set(edge.origin_original_id),
            origin_metatype_id: Set(edge.origin_metatype_id),
            origin_data_source_id: Set(edge.origin_data_source_id),
            destination_original_id: Set(edge.destination_original_id),
            destination_metatype_id: Set(edge.destination_metatype_id),
            destination_data_source_id: Set(edge.destination_data_source_id),
            import_data_id: Set(edge.import_data_id),
            data_staging_id: Set(edge.data_staging_id),
            type_mapping_transformation_id: Set(edge.type_mapping_transformation_id),
            metadata: Set(edge.metadata.to_value()),
            created_at: Set(edge.created_at.unwrap_or(now)),
            modified_at: Set(now),
        }
    }

    /// Replaces a parameterized edge with one resolved edge per
    /// `(origin, destination)` pair. Returns `None` when the template is
    /// already gone, which means another linker expanded it first.
    #[instrument(skip(self, template, pairs), fields(edge_id = %template.id, pairs = pairs.len()))]
    pub async fn expand_template(
        &self,
        template: &edges::Model,
        pairs: Vec<(Uuid, Uuid)>,
    ) -> Result<Option<Vec<edges::Model>>, sea_orm::DbErr> {
        let txn = self.db.begin().await?;

        // The delete claims the template; a concurrent expansion sees 0 rows
        let claimed = edges::Entity::delete_many()
            .filter(edges::Column::Id.eq(template.id))
            .exec(&txn)
            .await?;
        if claimed.rows_affected == 0 {
            txn.rollback().await?;
            return Ok(None);
        }

        let expanded = pairs
            .into_iter()
            .map(|(origin_id, destination_id)| Edge {
                id: None,
                origin_id: Some(origin_id),
                destination_id: Some(destination_id),
                origin_parameters: Vec::new(),
                destination_parameters: Vec::new(),
                ..Edge::from(template.clone())
            })
            .collect();
        let stored = Self::insert_all(&txn, expanded).await?;

        txn.commit().await?;
        debug!("Expanded edge {} into {} edges", template.id, stored.len());
        Ok(Some(stored))
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<edges::Model>, sea_orm::DbErr> {
        edges::Entity::find_by_id(id).one(&self.db).await
    }

    /// One page of edges with an unresolved endpoint, ordered by id and
    /// starting after `after` when given.
    pub async fn list_orphaned(
        &self,
        container_id: Option<&str>,
        after: Option<Uuid>,
        limit: u64,
    ) -> Result<Vec<edges::Model>, sea_orm::DbErr> {
        let mut query = edges::Entity::find().filter(
            Condition::any()
                .add(edges::Column::OriginId.is_null())
                .add(edges::Column::DestinationId.is_null()),
        );
        if let Some(container_id) = container_id {
            query = query.filter(edges::Column::ContainerId.eq(container_id));
        }
        if let Some(after) = after {
            query = query.filter(edges::Column::Id.gt(after));
        }

        query
            .order_by_asc(edges::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await
    }

    pub async fn count_orphaned(&self, container_id: Option<&str>) -> Result<u64, sea_orm::DbErr> {
        let mut query = edges::Entity::find().filter(
            Condition::any()
                .add(edges::Column::OriginId.is_null())
                .add(edges::Column::DestinationId.is_null()),
        );
        if let Some(container_id) = container_id {
            query = query.filter(edges::Column::ContainerId.eq(container_id));
        }
        query.count(&self.db).await
    }

    /// Sets endpoint ids that are still NULL. Never overwrites a resolved
    /// endpoint, so concurrent linkers cannot clobber each other.
    pub async fn fill_endpoints(
        &self,
        edge_id: Uuid,
        origin_id: Option<Uuid>,
        destination_id: Option<Uuid>,
    ) -> Result<Option<edges::Model>, sea_orm::DbErr> {
        let now = Utc::now();

        if let Some(origin_id) = origin_id {
            edges::Entity::update_many()
                .col_expr(edges::Column::OriginId, Expr::value(origin_id))
                .col_expr(edges::Column::ModifiedAt, Expr::value(now))
                .filter(edges::Column::Id.eq(edge_id))
                .filter(edges::Column::OriginId.is_null())
                .exec(&self.db)
                .await?;
        }

        if let Some(destination_id) = destination_id {
            edges::Entity::update_many()
                .col_expr(edges::Column::DestinationId, Expr::value(destination_id))
                .col_expr(edges::Column::ModifiedAt, Expr::value(now))
                .filter(edges::Column::Id.eq(edge_id))
                .filter(edges::Column::DestinationId.is_null())
                .exec(&self.db)
                .await?;
        }

        self.get(edge_id).await
    }
}
