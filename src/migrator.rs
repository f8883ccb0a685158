use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_items_table::Migration),
            Box::new(m20240601_000002_create_transactions_table::Migration),
            Box::new(m20240601_000003_create_code_sequences_table::Migration),
        ]
    }
}

mod m20240601_000001_create_items_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000001_create_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Items::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Items::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Items::Code).string().not_null().unique_key())
                        .col(ColumnDef::new(Items::Kind).string().not_null())
                        .col(ColumnDef::new(Items::Name).string().not_null())
                        .col(ColumnDef::new(Items::Category).string().not_null())
                        .col(ColumnDef::new(Items::OriginId).uuid().null())
                        .col(ColumnDef::new(Items::Width).double().not_null())
                        .col(ColumnDef::new(Items::Length).double().not_null())
                        .col(
                            ColumnDef::new(Items::Quantity)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(ColumnDef::new(Items::MinQuantity).integer().null())
                        .col(ColumnDef::new(Items::Price).decimal().null())
                        .col(ColumnDef::new(Items::Observation).text().null())
                        .col(ColumnDef::new(Items::RemainingWidth).double().not_null())
                        .col(ColumnDef::new(Items::RemainingLength).double().not_null())
                        .col(ColumnDef::new(Items::RemainingArea).double().not_null())
                        .col(
                            ColumnDef::new(Items::ConsumedArea)
                                .double()
                                .not_null()
                                .default(0.0),
                        )
                        .col(
                            ColumnDef::new(Items::IsAvailable)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Items::Version)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Items::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Items::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_items_origin_id")
                        .table(Items::Table)
                        .col(Items::OriginId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_items_created_at")
                        .table(Items::Table)
                        .col(Items::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Items::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Items {
        Table,
        Id,
        Code,
        Kind,
        Name,
        Category,
        OriginId,
        Width,
        Length,
        Quantity,
        MinQuantity,
        Price,
        Observation,
        RemainingWidth,
        RemainingLength,
        RemainingArea,
        ConsumedArea,
        IsAvailable,
        Version,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000002_create_transactions_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000002_create_transactions_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // item_id is not a foreign key: history survives item deletion
            manager
                .create_table(
                    Table::create()
                        .table(Transactions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Transactions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Transactions::ItemId).uuid().not_null())
                        .col(ColumnDef::new(Transactions::Type).string().not_null())
                        .col(ColumnDef::new(Transactions::Width).double().not_null())
                        .col(ColumnDef::new(Transactions::Length).double().not_null())
                        .col(ColumnDef::new(Transactions::Area).double().not_null())
                        .col(
                            ColumnDef::new(Transactions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_transactions_item_id")
                        .table(Transactions::Table)
                        .col(Transactions::ItemId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Transactions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Transactions {
        Table,
        Id,
        ItemId,
        Type,
        Width,
        Length,
        Area,
        CreatedAt,
    }
}

mod m20240601_000003_create_code_sequences_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000003_create_code_sequences_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(CodeSequences::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CodeSequences::Prefix)
                                .string()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CodeSequences::LastValue)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CodeSequences::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum CodeSequences {
        Table,
        Prefix,
        LastValue,
    }
}
