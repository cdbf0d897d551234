use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entities::market_data::{self, DataSource};
use crate::services::ingestion::WriteStrategy;

/// One stored row as returned to clients. Prices are plain JSON numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDataRecord {
    pub id: i32,
    pub symbol: String,
    pub date: NaiveDate,
    #[serde(with = "rust_decimal::serde::float")]
    pub open: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub high: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub low: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub close: Decimal,
    pub volume: i64,
    pub source: DataSource,
    pub created_at: NaiveDateTime,
}

impl From<market_data::Model> for MarketDataRecord {
    fn from(model: market_data::Model) -> Self {
        Self {
            id: model.id,
            symbol: model.symbol,
            date: model.date,
            open: model.open,
            high: model.high,
            low: model.low,
            close: model.close,
            volume: model.volume,
            source: model.source,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDataResponse {
    pub symbol: String,
    pub count: usize,
    pub data: Vec<MarketDataRecord>,
}

impl MarketDataResponse {
    pub fn new(symbol: impl Into<String>, rows: Vec<market_data::Model>) -> Self {
        let data: Vec<MarketDataRecord> = rows.into_iter().map(Into::into).collect();
        Self {
            symbol: symbol.into(),
            count: data.len(),
            data,
        }
    }
}

/// Query for `GET /api/v1/market-data`. `limit` stays a string so an
/// unparseable value falls back to the default instead of a 400.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarketDataQuery {
    pub symbol: Option<String>,
    pub limit: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateRangeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Rows stay untyped until the validator has looked at each one, so a single
/// bad element yields a row error instead of rejecting the whole body.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkCreateRequest {
    pub data: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkCreateQuery {
    #[serde(default)]
    pub strategy: WriteStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkCreateResponse {
    pub message: String,
    pub count: usize,
    pub strategy: WriteStrategy,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct YahooFetchQuery {
    pub days: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YahooFetchResponse {
    pub message: String,
    pub symbol: String,
    pub count: usize,
    pub source: DataSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolsResponse {
    pub count: usize,
    pub symbols: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub message: String,
    pub symbol: String,
    pub rows_deleted: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvUploadResponse {
    pub message: String,
    pub rows_imported: usize,
    pub rows_skipped: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}
