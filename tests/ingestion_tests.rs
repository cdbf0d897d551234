mod common;

use chrono::NaiveDate;
use market_data_backend::{
    entities::{market_data, market_data::DataSource, prelude::MarketData},
    services::ingestion::{CreateError, IngestionBatch, IngestionPipeline, WriteStrategy},
};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};

use crate::common::{record, reject_inserts_of, setup_test_db};

async fn row_count(db: &DatabaseConnection) -> u64 {
    MarketData::find().count(db).await.unwrap()
}

async fn find_row(db: &DatabaseConnection, symbol: &str, day: u32, source: DataSource) -> market_data::Model {
    MarketData::find()
        .filter(market_data::Column::Symbol.eq(symbol))
        .filter(market_data::Column::Date.eq(NaiveDate::from_ymd_opt(2025, 1, day).unwrap()))
        .filter(market_data::Column::Source.eq(source))
        .one(db)
        .await
        .unwrap()
        .expect("row should exist")
}

#[tokio::test]
async fn test_upsert_is_idempotent() {
    let db = setup_test_db().await;
    let pipeline = IngestionPipeline::new(db.clone());

    let batch = || {
        IngestionBatch::from(vec![
            record("BBCA.JK", 2, dec!(8550), DataSource::Mirae),
            record("BBCA.JK", 3, dec!(8600), DataSource::Mirae),
            record("BBRI.JK", 2, dec!(4520), DataSource::Mirae),
        ])
    };

    let first = pipeline.ingest(batch(), WriteStrategy::Upsert).await.unwrap();
    assert_eq!(first.written, 3);
    let before = find_row(&db, "BBCA.JK", 3, DataSource::Mirae).await;

    let second = pipeline.ingest(batch(), WriteStrategy::Upsert).await.unwrap();
    assert_eq!(second.written, 3);
    assert_eq!(row_count(&db).await, 3);

    let after = find_row(&db, "BBCA.JK", 3, DataSource::Mirae).await;
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_upsert_overwrites_values_but_keeps_identity() {
    let db = setup_test_db().await;
    let pipeline = IngestionPipeline::new(db.clone());

    pipeline
        .ingest(
            vec![record("TLKM.JK", 6, dec!(2800), DataSource::Yahoo)].into(),
            WriteStrategy::Upsert,
        )
        .await
        .unwrap();
    let original = find_row(&db, "TLKM.JK", 6, DataSource::Yahoo).await;

    pipeline
        .ingest(
            vec![record("TLKM.JK", 6, dec!(2830), DataSource::Yahoo)].into(),
            WriteStrategy::Upsert,
        )
        .await
        .unwrap();
    let updated = find_row(&db, "TLKM.JK", 6, DataSource::Yahoo).await;

    assert_eq!(updated.id, original.id);
    assert_eq!(updated.created_at, original.created_at);
    assert_eq!(updated.close, dec!(2830));
    assert_eq!(row_count(&db).await, 1);
}

#[tokio::test]
async fn test_upsert_duplicate_in_batch_last_wins() {
    let db = setup_test_db().await;
    let pipeline = IngestionPipeline::new(db.clone());

    let report = pipeline
        .ingest(
            vec![
                record("ASII.JK", 7, dec!(5000), DataSource::Manual),
                record("ASII.JK", 7, dec!(5100), DataSource::Manual),
                record("ASII.JK", 7, dec!(5050), DataSource::Manual),
            ]
            .into(),
            WriteStrategy::Upsert,
        )
        .await
        .unwrap();

    assert_eq!(report.written, 3);
    assert_eq!(row_count(&db).await, 1);
    assert_eq!(find_row(&db, "ASII.JK", 7, DataSource::Manual).await.close, dec!(5050));
}

#[tokio::test]
async fn test_sources_do_not_collide() {
    let db = setup_test_db().await;
    let pipeline = IngestionPipeline::new(db.clone());

    pipeline
        .ingest(
            vec![
                record("BBCA.JK", 2, dec!(8550), DataSource::Yahoo),
                record("BBCA.JK", 2, dec!(8551), DataSource::Mirae),
            ]
            .into(),
            WriteStrategy::Append,
        )
        .await
        .unwrap();

    assert_eq!(row_count(&db).await, 2);
}

#[tokio::test]
async fn test_append_conflict_rolls_back_whole_batch() {
    let db = setup_test_db().await;
    let pipeline = IngestionPipeline::new(db.clone());

    pipeline
        .ingest(
            vec![record("BBRI.JK", 3, dec!(4500), DataSource::Yahoo)].into(),
            WriteStrategy::Append,
        )
        .await
        .unwrap();

    let err = pipeline
        .ingest(
            vec![
                record("BBRI.JK", 2, dec!(4490), DataSource::Yahoo),
                record("BBRI.JK", 3, dec!(4510), DataSource::Yahoo),
                record("BBRI.JK", 6, dec!(4520), DataSource::Yahoo),
            ]
            .into(),
            WriteStrategy::Append,
        )
        .await
        .unwrap_err();

    assert!(err.is_conflict());
    assert_eq!(err.strategy, WriteStrategy::Append);
    assert_eq!(err.uncommitted, 3);
    assert_eq!(row_count(&db).await, 1);
    assert_eq!(find_row(&db, "BBRI.JK", 3, DataSource::Yahoo).await.close, dec!(4500));
}

#[tokio::test]
async fn test_append_duplicate_within_batch_writes_nothing() {
    let db = setup_test_db().await;
    let pipeline = IngestionPipeline::new(db.clone());

    let result = pipeline
        .ingest(
            vec![
                record("TLKM.JK", 2, dec!(2800), DataSource::Mirae),
                record("TLKM.JK", 2, dec!(2810), DataSource::Mirae),
            ]
            .into(),
            WriteStrategy::Append,
        )
        .await;

    assert!(result.is_err());
    assert_eq!(row_count(&db).await, 0);
}

#[tokio::test]
async fn test_empty_batch_is_a_no_op() {
    let db = setup_test_db().await;
    let pipeline = IngestionPipeline::new(db.clone());

    for strategy in [WriteStrategy::Append, WriteStrategy::Upsert] {
        let report = pipeline.ingest(IngestionBatch::default(), strategy).await.unwrap();
        assert_eq!(report.written, 0);
        assert!(report.skipped.is_empty());
    }
    assert_eq!(row_count(&db).await, 0);
}

#[tokio::test]
async fn test_create_assigns_id_and_refuses_duplicates() {
    let db = setup_test_db().await;
    let pipeline = IngestionPipeline::new(db.clone());

    let created = pipeline
        .create(record("BBCA.JK", 7, dec!(8550), DataSource::Manual))
        .await
        .unwrap();
    assert!(created.id > 0);
    assert_eq!(created.symbol, "BBCA.JK");

    let err = pipeline
        .create(record("BBCA.JK", 7, dec!(9999), DataSource::Manual))
        .await
        .unwrap_err();
    assert!(matches!(err, CreateError::Duplicate { .. }));

    let rows = MarketData::find()
        .order_by_asc(market_data::Column::Id)
        .all(&db)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].close, dec!(8550));
}

#[tokio::test]
async fn test_large_append_spans_several_statements() {
    let db = setup_test_db().await;
    let pipeline = IngestionPipeline::new(db.clone());

    let records: Vec<_> = (0..2500)
        .map(|i| record(&format!("SYM{}.JK", i), 2, dec!(100), DataSource::Mirae))
        .collect();

    let report = pipeline.ingest(records.into(), WriteStrategy::Append).await.unwrap();
    assert_eq!(report.written, 2500);
    assert_eq!(row_count(&db).await, 2500);
}

#[tokio::test]
async fn test_upsert_storage_failure_rolls_back_whole_batch() {
    let db = setup_test_db().await;
    let pipeline = IngestionPipeline::new(db.clone());
    reject_inserts_of(&db, "BBRI.JK").await;

    let err = pipeline
        .ingest(
            vec![
                record("BBCA.JK", 2, dec!(8550), DataSource::Mirae),
                record("BBRI.JK", 2, dec!(4520), DataSource::Mirae),
                record("TLKM.JK", 2, dec!(2800), DataSource::Mirae),
            ]
            .into(),
            WriteStrategy::Upsert,
        )
        .await
        .unwrap_err();

    assert!(!err.is_conflict());
    assert_eq!(err.strategy, WriteStrategy::Upsert);
    assert_eq!(err.uncommitted, 3);
    assert_eq!(err.skipped, 0);
    assert_eq!(row_count(&db).await, 0);
}
