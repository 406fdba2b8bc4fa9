use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};
use serde_json::Value;
use tracing::instrument;
use uuid::Uuid;

use crate::database::entities::data_staging;

pub struct StagingService {
    db: DatabaseConnection,
}

impl StagingService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        data_source_id: &str,
        import_id: Option<&str>,
        data: Value,
    ) -> Result<data_staging::Model, sea_orm::DbErr> {
        let active = Self::active_model(data_source_id, import_id, data);
        data_staging::Entity::insert(active)
            .exec_with_returning(&self.db)
            .await
    }

    /// Stages every payload of one import in a single transaction.
    #[instrument(skip(self, records), fields(count = records.len()))]
    pub async fn create_many(
        &self,
        data_source_id: &str,
        import_id: Option<&str>,
        records: Vec<Value>,
    ) -> Result<Vec<data_staging::Model>, sea_orm::DbErr> {
        let txn = self.db.begin().await?;
        let mut stored = Vec::with_capacity(records.len());
        for data in records {
            let active = Self::active_model(data_source_id, import_id, data);
            stored.push(data_staging::Entity::insert(active).exec_with_returning(&txn).await?);
        }
        txn.commit().await?;
        Ok(stored)
    }

    fn active_model(
        data_source_id: &str,
        import_id: Option<&str>,
        data: Value,
    ) -> data_staging::ActiveModel {
        data_staging::ActiveModel {
            id: Set(Uuid::new_v4()),
            data_source_id: Set(data_source_id.to_string()),
            import_id: Set(import_id.map(str::to_string)),
            data: Set(data),
            errors: Set(None),
            inserted_at: Set(None),
            created_at: Set(Utc::now()),
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<data_staging::Model>, sea_orm::DbErr> {
        data_staging::Entity::find_by_id(id).one(&self.db).await
    }

    pub async fn list_unprocessed(
        &self,
        data_source_id: &str,
    ) -> Result<Vec<data_staging::Model>, sea_orm::DbErr> {
        data_staging::Entity::find()
            .filter(data_staging::Column::DataSourceId.eq(data_source_id))
            .filter(data_staging::Column::InsertedAt.is_null())
            .order_by_asc(data_staging::Column::CreatedAt)
            .all(&self.db)
            .await
    }

    pub async fn list_unprocessed_for_import(
        &self,
        import_id: &str,
    ) -> Result<Vec<data_staging::Model>, sea_orm::DbErr> {
        data_staging::Entity::find()
            .filter(data_staging::Column::ImportId.eq(import_id))
            .filter(data_staging::Column::InsertedAt.is_null())
            .order_by_asc(data_staging::Column::CreatedAt)
            .all(&self.db)
            .await
    }

    /// Writes the error list and the processed timestamp in one update on
    /// `conn`, so it commits together with the record's nodes and edges.
    pub async fn complete<C>(conn: &C, id: Uuid, errors: Vec<String>) -> Result<(), sea_orm::DbErr>
    where
        C: ConnectionTrait,
    {
        data_staging::ActiveModel {
            id: Set(id),
            errors: Set(Self::error_value(errors)),
            inserted_at: Set(Some(Utc::now())),
            ..Default::default()
        }
        .update(conn)
        .await?;
        Ok(())
    }

    fn error_value(errors: Vec<String>) -> Option<Value> {
        if errors.is_empty() {
            None
        } else {
            Some(Value::from(errors))
        }
    }
}
