use async_trait::async_trait;
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};
use tracing::debug;

use crate::database::entities::queue_messages;
use crate::errors::QueueError;
use crate::queue::{Queue, QueueMessage};

/// Queue backed by the `queue_messages` table. A message is claimed by
/// deleting its row; a consumer that loses the race moves on to the next one.
#[derive(Clone)]
pub struct DatabaseQueue {
    db: DatabaseConnection,
}

impl DatabaseQueue {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Queue for DatabaseQueue {
    async fn put(&self, topic: &str, message: QueueMessage) -> Result<(), QueueError> {
        let active = queue_messages::ActiveModel {
            id: Set(message.id),
            topic: Set(topic.to_string()),
            payload: Set(message.payload),
            available_at: Set(message.available_at),
            created_at: Set(Utc::now()),
        };
        queue_messages::Entity::insert(active).exec(&self.db).await?;
        Ok(())
    }

    async fn poll(&self, topic: &str) -> Result<Option<QueueMessage>, QueueError> {
        loop {
            let candidate = queue_messages::Entity::find()
                .filter(queue_messages::Column::Topic.eq(topic))
                .filter(queue_messages::Column::AvailableAt.lte(Utc::now()))
                .order_by_asc(queue_messages::Column::AvailableAt)
                .order_by_asc(queue_messages::Column::CreatedAt)
                .one(&self.db)
                .await?;

            let Some(row) = candidate else {
                return Ok(None);
            };

            let claimed = queue_messages::Entity::delete_by_id(row.id)
                .exec(&self.db)
                .await?;
            if claimed.rows_affected == 1 {
                return Ok(Some(QueueMessage {
                    id: row.id,
                    payload: row.payload,
                    available_at: row.available_at,
                }));
            }
            debug!("Message {} on {} claimed by another consumer", row.id, topic);
        }
    }

    async fn pending(&self, topic: &str) -> Result<usize, QueueError> {
        let count = queue_messages::Entity::find()
            .filter(queue_messages::Column::Topic.eq(topic))
            .count(&self.db)
            .await?;
        Ok(count as usize)
    }
}
