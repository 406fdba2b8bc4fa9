use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DataStaging::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(DataStaging::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(DataStaging::DataSourceId).string().not_null())
                    .col(ColumnDef::new(DataStaging::ImportId).string().null())
                    .col(ColumnDef::new(DataStaging::Data).json_binary().not_null())
                    .col(ColumnDef::new(DataStaging::Errors).json_binary().null())
                    .col(ColumnDef::new(DataStaging::InsertedAt).timestamp().null())
                    .col(ColumnDef::new(DataStaging::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_data_staging_source_pending")
                    .table(DataStaging::Table)
                    .col(DataStaging::DataSourceId)
                    .col(DataStaging::InsertedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TypeTransformations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TypeTransformations::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TypeTransformations::ContainerId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TypeTransformations::DataSourceId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TypeTransformations::Name).string().null())
                    .col(
                        ColumnDef::new(TypeTransformations::Definition)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TypeTransformations::Archived)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(TypeTransformations::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TypeTransformations::ModifiedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_type_transformations_source")
                    .table(TypeTransformations::Table)
                    .col(TypeTransformations::DataSourceId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OntologyKeys::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OntologyKeys::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OntologyKeys::Kind).string().not_null())
                    .col(ColumnDef::new(OntologyKeys::ParentId).string().null())
                    .col(ColumnDef::new(OntologyKeys::PropertyName).string().not_null())
                    .col(
                        ColumnDef::new(OntologyKeys::DataType)
                            .string()
                            .not_null()
                            .default("unknown"),
                    )
                    .col(
                        ColumnDef::new(OntologyKeys::Required)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(OntologyKeys::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OntologyKeys::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TypeTransformations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DataStaging::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum DataStaging {
    Table,
    Id,
    DataSourceId,
    ImportId,
    Data,
    Errors,
    InsertedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum TypeTransformations {
    Table,
    Id,
    ContainerId,
    DataSourceId,
    Name,
    Definition,
    Archived,
    CreatedAt,
    ModifiedAt,
}

#[derive(DeriveIden)]
enum OntologyKeys {
    Table,
    Id,
    Kind,
    ParentId,
    PropertyName,
    DataType,
    Required,
    CreatedAt,
}
