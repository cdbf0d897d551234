//! Writes validated market-data batches in a single transaction.
//!
//! Two strategies:
//! - `Append` inserts everything; any natural-key collision aborts the batch.
//! - `Upsert` inserts or overwrites prices and volume per `(symbol, date, source)`.
//!   Statements run in submission order, so a key repeated within one batch
//!   ends with the values of its last occurrence.
//!
//! A batch is either fully committed or leaves the table untouched.

use std::fmt;

use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entities::market_data::{self, Column};
use crate::entities::prelude::MarketData;
use crate::services::record_validator::{RowError, ValidatedRecord};

/// Rows per multi-row INSERT on the append path. Keeps statements under the
/// bind-parameter limits of both Postgres and SQLite.
const APPEND_CHUNK_SIZE: usize = 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteStrategy {
    Append,
    #[default]
    Upsert,
}

impl fmt::Display for WriteStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteStrategy::Append => f.write_str("append"),
            WriteStrategy::Upsert => f.write_str("upsert"),
        }
    }
}

/// Validated records plus the rows that were dropped on the way.
#[derive(Debug, Default)]
pub struct IngestionBatch {
    records: Vec<ValidatedRecord>,
    errors: Vec<RowError>,
}

impl IngestionBatch {
    pub fn push(&mut self, record: ValidatedRecord) {
        self.records.push(record);
    }

    pub fn skip(&mut self, error: RowError) {
        self.errors.push(error);
    }

    pub fn records(&self) -> &[ValidatedRecord] {
        &self.records
    }

    pub fn errors(&self) -> &[RowError] {
        &self.errors
    }

    pub fn into_parts(self) -> (Vec<ValidatedRecord>, Vec<RowError>) {
        (self.records, self.errors)
    }
}

impl From<Vec<ValidatedRecord>> for IngestionBatch {
    fn from(records: Vec<ValidatedRecord>) -> Self {
        Self {
            records,
            errors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionReport {
    pub strategy: WriteStrategy,
    pub written: usize,
    pub skipped: Vec<RowError>,
}

/// The write transaction failed and was rolled back.
#[derive(Debug, Error)]
#[error("{strategy} of {uncommitted} rows rolled back: {source}")]
pub struct IngestionError {
    pub strategy: WriteStrategy,
    /// Valid rows that were not stored because of the rollback
    pub uncommitted: usize,
    /// Rows already rejected by validation
    pub skipped: usize,
    #[source]
    pub source: DbErr,
}

impl IngestionError {
    pub fn is_conflict(&self) -> bool {
        matches!(
            self.source.sql_err(),
            Some(SqlErr::UniqueConstraintViolation(_))
        )
    }
}

#[derive(Debug, Error)]
pub enum CreateError {
    #[error("record for {symbol} on {date} from {feed} already exists")]
    Duplicate {
        symbol: String,
        date: chrono::NaiveDate,
        feed: market_data::DataSource,
    },
    #[error(transparent)]
    Database(#[from] DbErr),
}

#[derive(Clone)]
pub struct IngestionPipeline {
    db: DatabaseConnection,
}

impl IngestionPipeline {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Write the valid part of `batch`. An empty batch is a successful no-op
    /// that never touches the store.
    pub async fn ingest(
        &self,
        batch: IngestionBatch,
        strategy: WriteStrategy,
    ) -> Result<IngestionReport, IngestionError> {
        let (records, skipped) = batch.into_parts();

        if records.is_empty() {
            tracing::debug!(%strategy, skipped = skipped.len(), "nothing to write");
            return Ok(IngestionReport {
                strategy,
                written: 0,
                skipped,
            });
        }

        let total = records.len();
        let result = match strategy {
            WriteStrategy::Append => self.append(records).await,
            WriteStrategy::Upsert => self.upsert(records).await,
        };

        match result {
            Ok(()) => {
                tracing::info!(
                    "Ingested {} market data rows ({}), {} skipped",
                    total,
                    strategy,
                    skipped.len()
                );
                Ok(IngestionReport {
                    strategy,
                    written: total,
                    skipped,
                })
            }
            Err(source) => {
                let err = IngestionError {
                    strategy,
                    uncommitted: total,
                    skipped: skipped.len(),
                    source,
                };
                tracing::error!(
                    error = %err.source,
                    %strategy,
                    uncommitted = total,
                    "market data batch rolled back"
                );
                Err(err)
            }
        }
    }

    /// Insert a single record, refusing to overwrite an existing natural key.
    pub async fn create(&self, record: ValidatedRecord) -> Result<market_data::Model, CreateError> {
        let (symbol, date, feed) = (record.symbol.clone(), record.date, record.source);

        match record.into_active_model().insert(&self.db).await {
            Ok(model) => Ok(model),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Err(CreateError::Duplicate { symbol, date, feed })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn append(&self, records: Vec<ValidatedRecord>) -> Result<(), DbErr> {
        let txn = self.db.begin().await?;

        let mut models = records.into_iter().map(ValidatedRecord::into_active_model).peekable();
        while models.peek().is_some() {
            let chunk: Vec<market_data::ActiveModel> = models.by_ref().take(APPEND_CHUNK_SIZE).collect();
            // dropping `txn` on error rolls the whole batch back
            MarketData::insert_many(chunk).exec_without_returning(&txn).await?;
        }

        txn.commit().await
    }

    async fn upsert(&self, records: Vec<ValidatedRecord>) -> Result<(), DbErr> {
        let txn = self.db.begin().await?;

        for record in records {
            MarketData::insert(record.into_active_model())
                .on_conflict(
                    OnConflict::columns([Column::Symbol, Column::Date, Column::Source])
                        .update_columns([
                            Column::Open,
                            Column::High,
                            Column::Low,
                            Column::Close,
                            Column::Volume,
                        ])
                        .to_owned(),
                )
                .exec_without_returning(&txn)
                .await?;
        }

        txn.commit().await
    }
}
