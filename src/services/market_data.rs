use chrono::NaiveDate;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, Order, QueryFilter, QueryOrder,
    QuerySelect,
};

use crate::entities::market_data::{self, Column, DataSource};
use crate::entities::prelude::MarketData;

/// Read and delete side of the `market_data` table. Writes go through the
/// ingestion pipeline.
#[derive(Clone)]
pub struct MarketDataService {
    db: DatabaseConnection,
}

impl MarketDataService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Most recent `limit` rows for a symbol, newest first.
    pub async fn latest_rows(
        &self,
        symbol: &str,
        source: Option<DataSource>,
        limit: u64,
    ) -> Result<Vec<market_data::Model>, DbErr> {
        let mut query = MarketData::find().filter(Column::Symbol.eq(symbol));
        if let Some(source) = source {
            query = query.filter(Column::Source.eq(source));
        }

        query
            .order_by(Column::Date, Order::Desc)
            .order_by(Column::Source, Order::Asc)
            .limit(limit)
            .all(&self.db)
            .await
    }

    /// Rows for a symbol with `start <= date <= end`, oldest first.
    pub async fn date_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<market_data::Model>, DbErr> {
        MarketData::find()
            .filter(Column::Symbol.eq(symbol))
            .filter(Column::Date.between(start, end))
            .order_by(Column::Date, Order::Asc)
            .order_by(Column::Source, Order::Asc)
            .all(&self.db)
            .await
    }

    pub async fn latest(&self, symbol: &str) -> Result<Option<market_data::Model>, DbErr> {
        MarketData::find()
            .filter(Column::Symbol.eq(symbol))
            .order_by(Column::Date, Order::Desc)
            .one(&self.db)
            .await
    }

    pub async fn symbols(&self) -> Result<Vec<String>, DbErr> {
        MarketData::find()
            .select_only()
            .column(Column::Symbol)
            .distinct()
            .order_by(Column::Symbol, Order::Asc)
            .into_tuple::<String>()
            .all(&self.db)
            .await
    }

    /// Remove every row for a symbol across all sources. Returns the number
    /// of rows removed.
    pub async fn delete_symbol(&self, symbol: &str) -> Result<u64, DbErr> {
        let result = MarketData::delete_many()
            .filter(Column::Symbol.eq(symbol))
            .exec(&self.db)
            .await?;

        tracing::info!("Deleted {} market data rows for {}", result.rows_affected, symbol);
        Ok(result.rows_affected)
    }

    pub async fn ping(&self) -> Result<(), DbErr> {
        self.db.ping().await
    }
}
