use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserPreferences::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserPreferences::UserId)
                            .string_len(255)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UserPreferences::Email).string_len(255).not_null())
                    .col(
                        ColumnDef::new(UserPreferences::DefaultSource)
                            .string_len(50)
                            .not_null()
                            .default("yahoo"),
                    )
                    // JSON arrays used as ordered sets of symbols
                    .col(ColumnDef::new(UserPreferences::SelectedSymbols).json().not_null())
                    .col(ColumnDef::new(UserPreferences::Watchlist).json().not_null())
                    .col(
                        ColumnDef::new(UserPreferences::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .col(
                        ColumnDef::new(UserPreferences::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_user_preferences_email")
                    .table(UserPreferences::Table)
                    .col(UserPreferences::Email)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserPreferences::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UserPreferences {
    Table,
    UserId,
    Email,
    DefaultSource,
    SelectedSymbols,
    Watchlist,
    CreatedAt,
    UpdatedAt,
}
