use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Nodes::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Nodes::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Nodes::ContainerId).string().not_null())
                    .col(ColumnDef::new(Nodes::MetatypeId).string().not_null())
                    .col(ColumnDef::new(Nodes::DataSourceId).string().not_null())
                    .col(ColumnDef::new(Nodes::OriginalDataId).string().null())
                    .col(ColumnDef::new(Nodes::Properties).json_binary().not_null())
                    .col(ColumnDef::new(Nodes::Metadata).json_binary().not_null())
                    .col(ColumnDef::new(Nodes::ImportDataId).string().null())
                    .col(ColumnDef::new(Nodes::DataStagingId).uuid().null())
                    .col(
                        ColumnDef::new(Nodes::TypeMappingTransformationId)
                            .string()
                            .null(),
                    )
                    .col(ColumnDef::new(Nodes::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Nodes::ModifiedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        // Composite identity for upserts
        manager
            .create_index(
                Index::create()
                    .name("idx_nodes_identity_unique")
                    .table(Nodes::Table)
                    .col(Nodes::ContainerId)
                    .col(Nodes::MetatypeId)
                    .col(Nodes::DataSourceId)
                    .col(Nodes::OriginalDataId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_nodes_lookup")
                    .table(Nodes::Table)
                    .col(Nodes::ContainerId)
                    .col(Nodes::DataSourceId)
                    .col(Nodes::OriginalDataId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Edges::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Edges::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Edges::ContainerId).string().not_null())
                    .col(
                        ColumnDef::new(Edges::MetatypeRelationshipPairId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Edges::DataSourceId).string().not_null())
                    .col(ColumnDef::new(Edges::Properties).json_binary().not_null())
                    .col(ColumnDef::new(Edges::OriginId).uuid().null())
                    .col(ColumnDef::new(Edges::DestinationId).uuid().null())
                    .col(ColumnDef::new(Edges::OriginOriginalId).string().null())
                    .col(ColumnDef::new(Edges::OriginMetatypeId).string().null())
                    .col(ColumnDef::new(Edges::OriginDataSourceId).string().null())
                    .col(ColumnDef::new(Edges::DestinationOriginalId).string().null())
                    .col(ColumnDef::new(Edges::DestinationMetatypeId).string().null())
                    .col(
                        ColumnDef::new(Edges::DestinationDataSourceId)
                            .string()
                            .null(),
                    )
                    .col(ColumnDef::new(Edges::OriginParameters).json_binary().null())
                    .col(
                        ColumnDef::new(Edges::DestinationParameters)
                            .json_binary()
                            .null(),
                    )
                    .col(ColumnDef::new(Edges::ImportDataId).string().null())
                    .col(ColumnDef::new(Edges::DataStagingId).uuid().null())
                    .col(
                        ColumnDef::new(Edges::TypeMappingTransformationId)
                            .string()
                            .null(),
                    )
                    .col(ColumnDef::new(Edges::Metadata).json_binary().not_null())
                    .col(ColumnDef::new(Edges::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Edges::ModifiedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_edges_container")
                    .table(Edges::Table)
                    .col(Edges::ContainerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_edges_endpoints")
                    .table(Edges::Table)
                    .col(Edges::OriginId)
                    .col(Edges::DestinationId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Edges::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Nodes::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Nodes {
    Table,
    Id,
    ContainerId,
    MetatypeId,
    DataSourceId,
    OriginalDataId,
    Properties,
    Metadata,
    ImportDataId,
    DataStagingId,
    TypeMappingTransformationId,
    CreatedAt,
    ModifiedAt,
}

#[derive(DeriveIden)]
enum Edges {
    Table,
    Id,
    ContainerId,
    MetatypeRelationshipPairId,
    DataSourceId,
    Properties,
    OriginId,
    DestinationId,
    OriginOriginalId,
    OriginMetatypeId,
    OriginDataSourceId,
    DestinationOriginalId,
    DestinationMetatypeId,
    DestinationDataSourceId,
    OriginParameters,
    DestinationParameters,
    ImportDataId,
    DataStagingId,
    TypeMappingTransformationId,
    Metadata,
    CreatedAt,
    ModifiedAt,
}
