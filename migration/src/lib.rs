pub use sea_orm_migration::prelude::*;

mod m20250107_000001_create_market_data;
mod m20250107_000002_create_user_preferences;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250107_000001_create_market_data::Migration),
            Box::new(m20250107_000002_create_user_preferences::Migration),
        ]
    }
}
