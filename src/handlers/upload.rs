use axum::{
    extract::{Multipart, State},
    Json,
};

use crate::{
    entities::market_data::DataSource,
    error::ApiError,
    models::market_data::CsvUploadResponse,
    services::{
        ingestion::WriteStrategy,
        record_validator::{read_csv, CsvImportError},
    },
    AppState,
};

/// Source recorded for uploaded files unless the form names another one.
pub const DEFAULT_CSV_SOURCE: DataSource = DataSource::Mirae;

/// Handler for POST /api/v1/upload/csv
///
/// Multipart form with a `file` part (`Symbol,Date,Open,High,Low,Close,Volume`)
/// and an optional `source` part. Valid rows are upserted in one transaction;
/// invalid rows are skipped and listed in the response.
pub async fn upload_csv(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<CsvUploadResponse>, ApiError> {
    let mut file = None;
    let mut source = DEFAULT_CSV_SOURCE;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request_with("Invalid multipart body", e.body_text()))?
    {
        match field.name() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload.csv").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request_with("Failed to read uploaded file", e.body_text()))?;
                tracing::info!("Processing CSV upload {} ({} bytes)", filename, bytes.len());
                file = Some(bytes);
            }
            Some("source") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request_with("Invalid multipart body", e.body_text()))?;
                source = value
                    .trim()
                    .parse()
                    .map_err(|e| ApiError::bad_request_with("Invalid source", e))?;
            }
            _ => {}
        }
    }

    let Some(bytes) = file else {
        return Err(ApiError::bad_request("No file uploaded"));
    };

    let batch = match read_csv(bytes.as_ref(), source) {
        Ok(batch) => batch,
        Err(CsvImportError::Empty) => {
            return Err(ApiError::bad_request("CSV file is empty or has no data rows"));
        }
        Err(e @ CsvImportError::Parse(_)) => {
            return Err(ApiError::bad_request_with("Failed to parse CSV", e));
        }
    };

    let report = state.ingestion.ingest(batch, WriteStrategy::Upsert).await?;

    Ok(Json(CsvUploadResponse {
        message: "CSV processed successfully".to_string(),
        rows_imported: report.written,
        rows_skipped: report.skipped.len(),
        errors: report.skipped.iter().map(ToString::to_string).collect(),
    }))
}
