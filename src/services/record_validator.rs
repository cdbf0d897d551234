//! Normalizes and validates candidate market-data rows.
//!
//! A candidate goes through three stages and stops at the first failure:
//! field presence, date parsing (`YYYY-MM-DD`), then numeric coercion with
//! range checks. The source name is resolved last. Failures are row-level
//! values, never batch aborts.

use std::fmt;
use std::io;
use std::str::FromStr;

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sea_orm::Set;
use serde_json::Value;
use thiserror::Error;

use crate::entities::market_data::{self, DataSource};
use crate::services::ingestion::IngestionBatch;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const CSV_COLUMNS: [&str; 7] = ["Symbol", "Date", "Open", "High", "Low", "Close", "Volume"];
pub const MAX_SYMBOL_LEN: usize = 20;

/// Why one candidate row was skipped.
///
/// `row` counts data rows from 1 (the CSV header is not a data row). `line`
/// is the physical line in the uploaded file, which is what a person opening
/// the file in an editor will look for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub row: usize,
    pub line: Option<u64>,
    pub reason: String,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "Row {} (line {}): {}", self.row, line, self.reason),
            None => write!(f, "Row {}: {}", self.row, self.reason),
        }
    }
}

/// Trimmed symbol, or why it cannot be stored.
pub fn check_symbol(symbol: &str) -> Result<&str, String> {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return Err("symbol is empty".to_string());
    }
    if symbol.chars().count() > MAX_SYMBOL_LEN {
        return Err(format!("symbol longer than {} characters", MAX_SYMBOL_LEN));
    }
    Ok(symbol)
}

/// A candidate that passed every check and may be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRecord {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: i64,
    pub source: DataSource,
}

impl ValidatedRecord {
    /// Range checks shared by every input format, including already-typed
    /// data from the external price source.
    #[allow(clippy::too_many_arguments)]
    pub fn try_new(
        symbol: &str,
        date: NaiveDate,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: i64,
        source: DataSource,
    ) -> Result<Self, String> {
        let symbol = check_symbol(symbol)?;
        for (field, value) in [("open", open), ("high", high), ("low", low), ("close", close)] {
            if value.is_sign_negative() && !value.is_zero() {
                return Err(format!("{} must be non-negative", field));
            }
        }
        if volume < 0 {
            return Err("volume must be non-negative".to_string());
        }

        Ok(Self {
            symbol: symbol.to_string(),
            date,
            open,
            high,
            low,
            close,
            volume,
            source,
        })
    }

    pub fn into_active_model(self) -> market_data::ActiveModel {
        market_data::ActiveModel {
            symbol: Set(self.symbol),
            date: Set(self.date),
            open: Set(self.open),
            high: Set(self.high),
            low: Set(self.low),
            close: Set(self.close),
            volume: Set(self.volume),
            source: Set(self.source),
            ..Default::default()
        }
    }
}

/// Text form of a candidate once every required field is present.
struct RawRecord<'a> {
    symbol: &'a str,
    date: &'a str,
    open: String,
    high: String,
    low: String,
    close: String,
    volume: String,
    source: &'a str,
}

/// Validate a JSON object from the create/bulk endpoints. Numbers may be
/// JSON numbers or numeric strings.
pub fn validate_json(value: &Value) -> Result<ValidatedRecord, String> {
    let object = value
        .as_object()
        .ok_or_else(|| "expected a JSON object".to_string())?;

    let field = |name: &str| -> Result<&Value, String> {
        match object.get(name) {
            None | Some(Value::Null) => Err(format!("missing required field '{}'", name)),
            Some(value) => Ok(value),
        }
    };

    // Stage 1: presence of every required field
    let symbol = field("symbol")?;
    let date = field("date")?;
    let numbers = [
        field("open")?,
        field("high")?,
        field("low")?,
        field("close")?,
        field("volume")?,
    ];
    let source = field("source")?;

    let symbol = symbol
        .as_str()
        .ok_or_else(|| "symbol must be a string".to_string())?;
    let date = date
        .as_str()
        .ok_or_else(|| "date must be a string in YYYY-MM-DD format".to_string())?;
    let source = source
        .as_str()
        .ok_or_else(|| "source must be a string".to_string())?;

    let [open, high, low, close, volume] = numbers;
    let raw = RawRecord {
        symbol,
        date,
        open: json_number_text("open", open)?,
        high: json_number_text("high", high)?,
        low: json_number_text("low", low)?,
        close: json_number_text("close", close)?,
        volume: json_number_text("volume", volume)?,
        source,
    };
    finish(raw)
}

/// Validate one CSV data row laid out as `Symbol,Date,Open,High,Low,Close,Volume`.
pub fn validate_csv_row(record: &StringRecord, source: DataSource) -> Result<ValidatedRecord, String> {
    if record.len() < CSV_COLUMNS.len() {
        return Err(format!(
            "insufficient columns (expected {}, found {})",
            CSV_COLUMNS.len(),
            record.len()
        ));
    }
    for (index, name) in CSV_COLUMNS.iter().enumerate() {
        if record[index].trim().is_empty() {
            return Err(format!("missing value for {}", name));
        }
    }

    let raw = RawRecord {
        symbol: &record[0],
        date: &record[1],
        open: record[2].to_string(),
        high: record[3].to_string(),
        low: record[4].to_string(),
        close: record[5].to_string(),
        volume: record[6].to_string(),
        source: source.as_str(),
    };
    finish(raw)
}

/// Stages 2 and 3, then the source name.
fn finish(raw: RawRecord<'_>) -> Result<ValidatedRecord, String> {
    let date = parse_date(raw.date)?;

    let open = parse_price("open", &raw.open)?;
    let high = parse_price("high", &raw.high)?;
    let low = parse_price("low", &raw.low)?;
    let close = parse_price("close", &raw.close)?;
    let volume = parse_volume(&raw.volume)?;

    let source = raw.source.trim().parse::<DataSource>()?;
    ValidatedRecord::try_new(raw.symbol, date, open, high, low, close, volume, source)
}

pub fn parse_date(text: &str) -> Result<NaiveDate, String> {
    let text = text.trim();
    // chrono accepts single-digit months and days; the format is fixed width
    if text.len() != 10 {
        return Err(format!("invalid date format '{}' (expected YYYY-MM-DD)", text));
    }
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .map_err(|_| format!("invalid date format '{}' (expected YYYY-MM-DD)", text))
}

fn parse_price(field: &str, text: &str) -> Result<Decimal, String> {
    let text = text.trim();
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map(|value| value.normalize())
        .map_err(|_| format!("invalid {} value '{}'", field, text))
}

fn parse_volume(text: &str) -> Result<i64, String> {
    let text = text.trim();
    if let Ok(volume) = text.parse::<i64>() {
        return Ok(volume);
    }
    // "12500000.0" and "1.25e7" are whole numbers too
    let value = Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map_err(|_| format!("invalid volume value '{}'", text))?;
    if !value.fract().is_zero() {
        return Err(format!("volume must be a whole number, got '{}'", text));
    }
    value
        .to_i64()
        .ok_or_else(|| format!("volume out of range '{}'", text))
}

fn json_number_text(field: &str, value: &Value) -> Result<String, String> {
    match value {
        Value::Number(number) => Ok(number.to_string()),
        Value::String(text) => Ok(text.trim().to_string()),
        _ => Err(format!("{} must be a number", field)),
    }
}

/// Validate every element of a JSON array body, keeping the failures.
pub fn validate_json_rows(rows: &[Value]) -> IngestionBatch {
    let mut batch = IngestionBatch::default();
    for (index, value) in rows.iter().enumerate() {
        match validate_json(value) {
            Ok(record) => batch.push(record),
            Err(reason) => batch.skip(RowError {
                row: index + 1,
                line: None,
                reason,
            }),
        }
    }
    batch
}

#[derive(Debug, Error)]
pub enum CsvImportError {
    #[error("CSV file is empty or has no data rows")]
    Empty,
    #[error("failed to parse CSV: {0}")]
    Parse(#[from] csv::Error),
}

/// Parse an uploaded CSV. Bad rows are recorded on the batch and reading
/// continues; only unreadable input fails the whole file.
pub fn read_csv<R: io::Read>(reader: R, source: DataSource) -> Result<IngestionBatch, CsvImportError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let header_matches = headers.len() >= CSV_COLUMNS.len()
        && CSV_COLUMNS
            .iter()
            .zip(headers.iter())
            .all(|(expected, actual)| expected.eq_ignore_ascii_case(actual));
    if !header_matches {
        tracing::warn!(
            header = ?headers,
            "CSV header does not match {}; reading columns by position",
            CSV_COLUMNS.join(",")
        );
    }

    let mut batch = IngestionBatch::default();
    let mut rows = 0;

    for (index, result) in reader.records().enumerate() {
        let row = index + 1;
        rows = row;
        match result {
            Ok(record) => {
                let line = record.position().map(|position| position.line());
                match validate_csv_row(&record, source) {
                    Ok(validated) => batch.push(validated),
                    Err(reason) => batch.skip(RowError { row, line, reason }),
                }
            }
            Err(e) if !e.is_io_error() => {
                let line = e.position().map(|position| position.line());
                batch.skip(RowError {
                    row,
                    line,
                    reason: format!("unreadable row: {}", e),
                });
            }
            Err(e) => return Err(e.into()),
        }
    }

    if rows == 0 {
        return Err(CsvImportError::Empty);
    }
    Ok(batch)
}
