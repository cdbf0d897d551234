use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, NaiveDate};
use reqwest::{Client, Url};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Deserialize;
use thiserror::Error;

use crate::config::{require_http_url, ConfigError, MarketConfig};
use crate::entities::market_data::DataSource;
use crate::services::record_validator::{check_symbol, RowError, ValidatedRecord};
use crate::services::ingestion::IngestionBatch;

/// Decimal places kept from the feed's floating-point prices.
const PRICE_SCALE: u32 = 4;

#[derive(Debug, Error)]
pub enum YahooError {
    #[error("invalid symbol '{symbol}': {reason}")]
    InvalidSymbol { symbol: String, reason: String },
    #[error("request to Yahoo Finance failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Yahoo Finance returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Yahoo Finance returned no data for {0}")]
    NoData(String),
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// Daily candles from the Yahoo Finance chart API.
#[derive(Clone)]
pub struct YahooFinanceService {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl YahooFinanceService {
    pub fn new(config: &MarketConfig) -> Result<Self, ConfigError> {
        let base_url = require_http_url("YAHOO_API_BASE_URL", &config.yahoo_api_base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::Invalid {
                key: "YAHOO_API_BASE_URL",
                value: config.yahoo_api_base_url.clone(),
                reason: "must be a base URL".to_string(),
            });
        }

        Ok(Self {
            client: Client::new(),
            base_url,
            timeout: config.yahoo_api_timeout,
        })
    }

    /// `{base}/chart/{symbol}` with the symbol encoded as a single path segment.
    fn chart_url(&self, symbol: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("chart").push(symbol);
        }
        url
    }

    /// Fetch the last `days` daily candles for `symbol`.
    ///
    /// Candles with a missing price or volume are dropped; candles that fail
    /// the record range checks are returned as row errors.
    pub async fn fetch_daily(&self, symbol: &str, days: u32) -> Result<IngestionBatch, YahooError> {
        let symbol = check_symbol(symbol).map_err(|reason| YahooError::InvalidSymbol {
            symbol: symbol.to_string(),
            reason,
        })?;
        tracing::info!("Fetching {} days of Yahoo Finance data for {}", days, symbol);

        let response = self
            .client
            .get(self.chart_url(symbol))
            .header("accept", "application/json")
            .query(&[("range", format!("{}d", days)), ("interval", "1d".to_string())])
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(YahooError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: ChartEnvelope = response.json().await?;
        if let Some(error) = envelope.chart.error {
            tracing::warn!(code = %error.code, "Yahoo Finance chart error: {}", error.description);
            return Err(YahooError::NoData(symbol.to_string()));
        }

        let result = envelope
            .chart
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| YahooError::NoData(symbol.to_string()))?;

        let batch = candles_to_batch(symbol, result);
        tracing::debug!(
            "Yahoo Finance returned {} usable candles for {} ({} rejected)",
            batch.records().len(),
            symbol,
            batch.errors().len()
        );
        Ok(batch)
    }
}

fn candles_to_batch(symbol: &str, result: ChartResult) -> IngestionBatch {
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let offset = result.meta.gmtoffset;

    // the feed repeats the live candle for the current session; keep the last per date
    let mut by_date: BTreeMap<NaiveDate, (usize, Result<ValidatedRecord, String>)> = BTreeMap::new();

    for (index, timestamp) in result.timestamp.iter().enumerate() {
        let candle = (
            value_at(&quote.open, index),
            value_at(&quote.high, index),
            value_at(&quote.low, index),
            value_at(&quote.close, index),
            value_at(&quote.volume, index),
        );
        let (Some(open), Some(high), Some(low), Some(close), Some(volume)) = candle else {
            continue;
        };
        let Some(date) = timestamp
            .checked_add(offset)
            .and_then(|local| DateTime::from_timestamp(local, 0))
            .map(|dt| dt.date_naive())
        else {
            continue;
        };

        let record = to_record(symbol, date, [open, high, low, close], volume);
        by_date.insert(date, (index + 1, record));
    }

    let mut batch = IngestionBatch::default();
    for (row, record) in by_date.into_values() {
        match record {
            Ok(record) => batch.push(record),
            Err(reason) => batch.skip(RowError {
                row,
                line: None,
                reason,
            }),
        }
    }
    batch
}

fn value_at(values: &[Option<f64>], index: usize) -> Option<f64> {
    values.get(index).copied().flatten().filter(|v| v.is_finite())
}

fn to_record(
    symbol: &str,
    date: NaiveDate,
    prices: [f64; 4],
    volume: f64,
) -> Result<ValidatedRecord, String> {
    let [open, high, low, close] = prices.map(|price| {
        Decimal::from_f64(price)
            .map(|d| d.round_dp(PRICE_SCALE).normalize())
            .ok_or_else(|| format!("price {} out of range", price))
    });
    if volume.fract() != 0.0 || volume > i64::MAX as f64 {
        return Err(format!("invalid volume {}", volume));
    }

    ValidatedRecord::try_new(
        symbol,
        date,
        open?,
        high?,
        low?,
        close?,
        volume as i64,
        DataSource::Yahoo,
    )
}
