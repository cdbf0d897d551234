use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MarketData::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MarketData::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MarketData::Symbol).string_len(20).not_null())
                    .col(ColumnDef::new(MarketData::Date).date().not_null())
                    .col(ColumnDef::new(MarketData::Open).decimal().not_null())
                    .col(ColumnDef::new(MarketData::High).decimal().not_null())
                    .col(ColumnDef::new(MarketData::Low).decimal().not_null())
                    .col(ColumnDef::new(MarketData::Close).decimal().not_null())
                    .col(ColumnDef::new(MarketData::Volume).big_integer().not_null())
                    .col(ColumnDef::new(MarketData::Source).string_len(50).not_null())
                    .col(
                        ColumnDef::new(MarketData::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .to_owned(),
            )
            .await?;

        // Natural key: one observation per symbol, date and source.
        // The upsert path targets this index with ON CONFLICT.
        manager
            .create_index(
                Index::create()
                    .name("idx_market_data_natural_key")
                    .table(MarketData::Table)
                    .col(MarketData::Symbol)
                    .col(MarketData::Date)
                    .col(MarketData::Source)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_market_data_symbol_date")
                    .table(MarketData::Table)
                    .col(MarketData::Symbol)
                    .col(MarketData::Date)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MarketData::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum MarketData {
    Table,
    Id,
    Symbol,
    Date,
    Open,
    High,
    Low,
    Close,
    Volume,
    Source,
    CreatedAt,
}
