use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(QueueMessages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(QueueMessages::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(QueueMessages::Topic).string().not_null())
                    .col(ColumnDef::new(QueueMessages::Payload).json_binary().not_null())
                    .col(
                        ColumnDef::new(QueueMessages::AvailableAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(QueueMessages::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_queue_messages_topic_available")
                    .table(QueueMessages::Table)
                    .col(QueueMessages::Topic)
                    .col(QueueMessages::AvailableAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EdgeResolutionFailures::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EdgeResolutionFailures::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(EdgeResolutionFailures::EdgeId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EdgeResolutionFailures::ContainerId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EdgeResolutionFailures::Attempts)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(EdgeResolutionFailures::Reason).text().not_null())
                    .col(
                        ColumnDef::new(EdgeResolutionFailures::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EdgeResolutionFailures::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(QueueMessages::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum QueueMessages {
    Table,
    Id,
    Topic,
    Payload,
    AvailableAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum EdgeResolutionFailures {
    Table,
    Id,
    EdgeId,
    ContainerId,
    Attempts,
    Reason,
    CreatedAt,
}
