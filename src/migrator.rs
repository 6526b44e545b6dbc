use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240115_000001_create_inventory_buckets_table::Migration),
            Box::new(m20240115_000002_create_stock_adjustments_table::Migration),
            Box::new(m20240115_000003_create_sequence_counters_table::Migration),
        ]
    }
}

mod m20240115_000001_create_inventory_buckets_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000001_create_inventory_buckets_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(InventoryBuckets::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryBuckets::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryBuckets::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(InventoryBuckets::WarehouseId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryBuckets::ShelfId).uuid().null())
                        .col(
                            ColumnDef::new(InventoryBuckets::Condition)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryBuckets::OnHand)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(InventoryBuckets::OnLoan)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(InventoryBuckets::LastInAt).timestamp().null())
                        .col(ColumnDef::new(InventoryBuckets::LastOutAt).timestamp().null())
                        .col(
                            ColumnDef::new(InventoryBuckets::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryBuckets::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // Natural key. Two concurrent creators of the same key race on
            // this index; the loser aborts with a unique violation and the
            // transaction runner retries it against the winner's row.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uidx_inventory_buckets_natural_key")
                        .table(InventoryBuckets::Table)
                        .col(InventoryBuckets::ProductId)
                        .col(InventoryBuckets::WarehouseId)
                        .col(InventoryBuckets::ShelfId)
                        .col(InventoryBuckets::Condition)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_buckets_warehouse_id")
                        .table(InventoryBuckets::Table)
                        .col(InventoryBuckets::WarehouseId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InventoryBuckets::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum InventoryBuckets {
        Table,
        Id,
        ProductId,
        WarehouseId,
        ShelfId,
        Condition,
        OnHand,
        OnLoan,
        LastInAt,
        LastOutAt,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240115_000002_create_stock_adjustments_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000002_create_stock_adjustments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockAdjustments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockAdjustments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockAdjustments::BucketId).uuid().not_null())
                        .col(ColumnDef::new(StockAdjustments::Field).string().not_null())
                        .col(ColumnDef::new(StockAdjustments::Delta).integer().not_null())
                        .col(
                            ColumnDef::new(StockAdjustments::QuantityBefore)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAdjustments::QuantityAfter)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAdjustments::ReasonCode)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockAdjustments::ReasonNote).string().null())
                        .col(ColumnDef::new(StockAdjustments::Actor).json().not_null())
                        .col(
                            ColumnDef::new(StockAdjustments::CorrelationId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAdjustments::Correlation)
                                .json()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAdjustments::ProductCode)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockAdjustments::Snapshot).json().not_null())
                        .col(
                            ColumnDef::new(StockAdjustments::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_adjustments_created_at")
                        .table(StockAdjustments::Table)
                        .col(StockAdjustments::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_adjustments_bucket_id")
                        .table(StockAdjustments::Table)
                        .col(StockAdjustments::BucketId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_adjustments_correlation_id")
                        .table(StockAdjustments::Table)
                        .col(StockAdjustments::CorrelationId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_adjustments_product_code")
                        .table(StockAdjustments::Table)
                        .col(StockAdjustments::ProductCode)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockAdjustments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum StockAdjustments {
        Table,
        Id,
        BucketId,
        Field,
        Delta,
        QuantityBefore,
        QuantityAfter,
        ReasonCode,
        ReasonNote,
        Actor,
        CorrelationId,
        Correlation,
        ProductCode,
        Snapshot,
        CreatedAt,
    }
}

mod m20240115_000003_create_sequence_counters_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000003_create_sequence_counters_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(SequenceCounters::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SequenceCounters::Prefix)
                                .string()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SequenceCounters::CurrentValue)
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
                .drop_table(Table::drop().table(SequenceCounters::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum SequenceCounters {
        Table,
        Prefix,
        CurrentValue,
    }
}
