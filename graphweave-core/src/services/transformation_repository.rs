use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use tracing::warn;
use uuid::Uuid;

use crate::database::entities::type_transformations;
use crate::domain::TransformationRule;
use crate::errors::ProcessingError;

/// Stores transformation rules per data source.
pub struct TransformationRepository {
    db: DatabaseConnection,
}

impl TransformationRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Persists `rule` for `data_source_id` and returns it with its new id.
    pub async fn create(
        &self,
        data_source_id: &str,
        mut rule: TransformationRule,
    ) -> Result<TransformationRule, ProcessingError> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        rule.id = Some(id.to_string());
        rule.data_source_id = Some(data_source_id.to_string());

        let active = type_transformations::ActiveModel {
            id: Set(id),
            container_id: Set(rule.container_id.clone()),
            data_source_id: Set(data_source_id.to_string()),
            name: Set(rule.name.clone()),
            definition: Set(serde_json::to_value(&rule)?),
            archived: Set(rule.archived),
            created_at: Set(now),
            modified_at: Set(now),
        };
        type_transformations::Entity::insert(active)
            .exec(&self.db)
            .await?;
        Ok(rule)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<TransformationRule>, ProcessingError> {
        type_transformations::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(Self::to_rule)
            .transpose()
    }

    /// Non-archived rules of a data source, oldest first. Rows whose stored
    /// definition no longer parses are skipped.
    pub async fn list_active(
        &self,
        data_source_id: &str,
    ) -> Result<Vec<TransformationRule>, ProcessingError> {
        let rows = type_transformations::Entity::find()
            .filter(type_transformations::Column::DataSourceId.eq(data_source_id))
            .filter(type_transformations::Column::Archived.eq(false))
            .order_by_asc(type_transformations::Column::CreatedAt)
            .all(&self.db)
            .await?;

        let mut rules = Vec::with_capacity(rows.len());
        for row in rows {
            match Self::to_rule(row) {
                Ok(rule) => rules.push(rule),
                Err(err) => warn!("Skipping transformation: {}", err),
            }
        }
        Ok(rules)
    }

    pub async fn archive(&self, id: Uuid) -> Result<(), ProcessingError> {
        type_transformations::ActiveModel {
            id: Set(id),
            archived: Set(true),
            modified_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(&self.db)
        .await?;
        Ok(())
    }

    fn to_rule(row: type_transformations::Model) -> Result<TransformationRule, ProcessingError> {
        let mut rule: TransformationRule = serde_json::from_value(row.definition)
            .map_err(|source| ProcessingError::InvalidTransformation { id: row.id, source })?;
        rule.id = Some(row.id.to_string());
        rule.container_id = row.container_id;
        rule.data_source_id = Some(row.data_source_id);
        rule.name = row.name;
        rule.archived = row.archived;
        Ok(rule)
    }
}
