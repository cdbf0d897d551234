use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;

use crate::{
    entities::market_data::DataSource,
    error::ApiError,
    models::market_data::{
        BulkCreateQuery, BulkCreateRequest, BulkCreateResponse, DateRangeQuery, DeleteResponse,
        MarketDataQuery, MarketDataRecord, MarketDataResponse, SymbolsResponse, YahooFetchQuery,
        YahooFetchResponse,
    },
    services::{
        ingestion::{CreateError, IngestionError, WriteStrategy},
        record_validator::{parse_date, validate_json, validate_json_rows},
        yahoo::YahooError,
    },
    AppState,
};

pub const DEFAULT_YAHOO_DAYS: u32 = 7;
pub const MAX_YAHOO_DAYS: u32 = 365;

/// Handler for GET /api/v1/market-data
pub async fn list_market_data(
    State(state): State<AppState>,
    Query(query): Query<MarketDataQuery>,
) -> Result<Json<MarketDataResponse>, ApiError> {
    let Some(symbol) = query.symbol.filter(|s| !s.trim().is_empty()) else {
        return Err(ApiError::bad_request("symbol parameter is required"));
    };

    let market = &state.config.market;
    let limit = resolve_limit(query.limit.as_deref(), market.default_data_limit, market.max_data_limit);

    let source = match query.source.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            raw.parse::<DataSource>()
                .map_err(|e| ApiError::bad_request_with("Invalid source", e))?,
        ),
        None => None,
    };

    let rows = state.market.latest_rows(&symbol, source, limit).await?;
    Ok(Json(MarketDataResponse::new(symbol, rows)))
}

/// Handler for GET /api/v1/market-data/{symbol}
pub async fn get_market_data_by_symbol(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<DateRangeQuery>,
) -> Result<Json<MarketDataResponse>, ApiError> {
    let start = query.start_date.filter(|s| !s.trim().is_empty());
    let end = query.end_date.filter(|s| !s.trim().is_empty());

    let rows = match (start, end) {
        (Some(start), Some(end)) => {
            let start = parse_date(&start)
                .map_err(|_| ApiError::bad_request("Invalid start_date format. Use YYYY-MM-DD"))?;
            let end = parse_date(&end)
                .map_err(|_| ApiError::bad_request("Invalid end_date format. Use YYYY-MM-DD"))?;
            if start > end {
                return Err(ApiError::bad_request("start_date must not be after end_date"));
            }
            state.market.date_range(&symbol, start, end).await?
        }
        (None, None) => {
            state
                .market
                .latest_rows(&symbol, None, state.config.market.default_data_limit)
                .await?
        }
        _ => {
            return Err(ApiError::bad_request(
                "start_date and end_date must be provided together",
            ));
        }
    };

    Ok(Json(MarketDataResponse::new(symbol, rows)))
}

/// Handler for GET /api/v1/market-data/{symbol}/latest
pub async fn get_latest_market_data(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<MarketDataRecord>, ApiError> {
    match state.market.latest(&symbol).await? {
        Some(row) => Ok(Json(row.into())),
        None => Err(ApiError::NotFound(format!("No data found for {}", symbol))),
    }
}

/// Handler for GET /api/v1/market-data/symbols
pub async fn list_symbols(State(state): State<AppState>) -> Result<Json<SymbolsResponse>, ApiError> {
    let symbols = state.market.symbols().await?;
    Ok(Json(SymbolsResponse {
        count: symbols.len(),
        symbols,
    }))
}

/// Handler for POST /api/v1/market-data
pub async fn create_market_data(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<MarketDataRecord>), ApiError> {
    let Json(body) = body.map_err(|e| ApiError::bad_request_with("Invalid request body", e.body_text()))?;

    let record = validate_json(&body).map_err(|reason| ApiError::bad_request_with("Invalid request body", reason))?;

    match state.ingestion.create(record).await {
        Ok(model) => {
            tracing::info!("Created market data {} {} ({})", model.symbol, model.date, model.source);
            Ok((StatusCode::CREATED, Json(model.into())))
        }
        Err(e @ CreateError::Duplicate { .. }) => Err(ApiError::Conflict(e.to_string())),
        Err(CreateError::Database(e)) => Err(e.into()),
    }
}

/// Handler for POST /api/v1/market-data/bulk
/// Every row must validate; otherwise nothing is written and all row errors
/// are returned.
pub async fn bulk_create_market_data(
    State(state): State<AppState>,
    Query(query): Query<BulkCreateQuery>,
    body: Result<Json<BulkCreateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BulkCreateResponse>), ApiError> {
    let Json(request) = body.map_err(|e| ApiError::bad_request_with("Invalid request body", e.body_text()))?;

    if request.data.is_empty() {
        return Err(ApiError::bad_request("data must contain at least one record"));
    }

    let batch = validate_json_rows(&request.data);
    if !batch.errors().is_empty() {
        let (_, errors) = batch.into_parts();
        tracing::warn!("Rejected bulk request: {} of {} rows invalid", errors.len(), request.data.len());
        return Err(ApiError::Validation { errors });
    }

    let report = state
        .ingestion
        .ingest(batch, query.strategy)
        .await
        .map_err(conflict_or_ingestion)?;

    Ok((
        StatusCode::CREATED,
        Json(BulkCreateResponse {
            message: "Data created successfully".to_string(),
            count: report.written,
            strategy: report.strategy,
        }),
    ))
}

/// Handler for POST /api/v1/market-data/yahoo/{symbol}
pub async fn fetch_yahoo_data(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<YahooFetchQuery>,
) -> Result<Json<YahooFetchResponse>, ApiError> {
    let days = resolve_days(query.days.as_deref());

    let batch = state.yahoo.fetch_daily(&symbol, days).await?;
    if batch.records().is_empty() {
        return Err(YahooError::NoData(symbol).into());
    }
    for error in batch.errors() {
        tracing::warn!("Dropped Yahoo candle for {}: {}", symbol, error);
    }

    let report = state
        .ingestion
        .ingest(batch, WriteStrategy::Append)
        .await
        .map_err(conflict_or_ingestion)?;

    Ok(Json(YahooFetchResponse {
        message: "Data fetched successfully".to_string(),
        symbol,
        count: report.written,
        source: DataSource::Yahoo,
    }))
}

/// Handler for DELETE /api/v1/market-data/{symbol} (admin only)
pub async fn delete_market_data(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let rows_deleted = state.market.delete_symbol(&symbol).await?;

    Ok(Json(DeleteResponse {
        message: "Data deleted successfully".to_string(),
        symbol,
        rows_deleted,
    }))
}

/// A natural-key collision on the append path is the caller's problem, not
/// a server fault.
fn conflict_or_ingestion(err: IngestionError) -> ApiError {
    if err.strategy == WriteStrategy::Append && err.is_conflict() {
        ApiError::Conflict(format!(
            "Batch of {} rows collides with existing data; nothing was written",
            err.uncommitted
        ))
    } else {
        err.into()
    }
}

/// Unparseable or zero limits fall back to the default; large ones are
/// capped at the maximum.
pub fn resolve_limit(raw: Option<&str>, default: u64, max: u64) -> u64 {
    match raw.and_then(|value| value.trim().parse::<u64>().ok()) {
        Some(0) | None => default,
        Some(limit) => limit.min(max),
    }
}

/// Out-of-range or unparseable values fall back to the default.
pub fn resolve_days(raw: Option<&str>) -> u32 {
    raw.and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|days| (1..=MAX_YAHOO_DAYS).contains(days))
        .unwrap_or(DEFAULT_YAHOO_DAYS)
}
