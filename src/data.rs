//! Data loading
//!
//! Reads daily OHLCV bars from CSV files with a
//! `datetime,open,high,low,close,volume` header.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::{info, warn};

use crate::config::BacktestConfig;
use crate::{Candle, Symbol};

/// Load OHLCV data from CSV file, skipping rows that fail candle validation
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<Candle>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open CSV file {}", path.display()))?;

    let mut candles = Vec::new();
    let mut invalid_count = 0;

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;

        let dt_str = record.get(0).context("Missing datetime column")?;
        let datetime = parse_date(dt_str)?;

        let field = |idx: usize, name: &str| -> Result<f64> {
            record
                .get(idx)
                .with_context(|| format!("Missing {} column", name))?
                .trim()
                .parse()
                .with_context(|| format!("Failed to parse {} at row {}", name, row_idx + 1))
        };

        let open = field(1, "open")?;
        let high = field(2, "high")?;
        let low = field(3, "low")?;
        let close = field(4, "close")?;
        let volume = field(5, "volume")?;

        match Candle::new(datetime, open, high, low, close, volume) {
            Ok(candle) => candles.push(candle),
            Err(e) => {
                invalid_count += 1;
                warn!(
                    "Skipping invalid candle at row {} in {:?}: {}",
                    row_idx + 2, // +2 for 1-indexed and header row
                    path.file_name().unwrap_or_default(),
                    e
                );
            }
        }
    }

    if invalid_count > 0 {
        warn!(
            "Skipped {} invalid candles out of {} in {:?}",
            invalid_count,
            invalid_count + candles.len(),
            path.file_name().unwrap_or_default()
        );
    }

    candles.sort_by_key(|c| c.datetime);

    Ok(candles)
}

/// Filter candles by date range (both ends inclusive)
pub fn filter_candles_by_date(
    candles: Vec<Candle>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Vec<Candle> {
    candles
        .into_iter()
        .filter(|c| {
            let after_start = start.map_or(true, |s| c.datetime >= s);
            let before_end = end.map_or(true, |e| c.datetime <= e);
            after_start && before_end
        })
        .collect()
}

/// Parse a date string (RFC 3339, YYYY-MM-DD HH:MM:SS or YYYY-MM-DD) to DateTime<Utc>
pub fn parse_date(date_str: &str) -> Result<DateTime<Utc>> {
    let date_str = date_str.trim();

    if let Ok(dt) = date_str.parse::<DateTime<Utc>>() {
        return Ok(dt);
    }

    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(date_str, "%Y-%m-%d %H:%M:%S") {
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc));
    }

    if let Ok(nd) = chrono::NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
        if let Some(ndt) = nd.and_hms_opt(0, 0, 0) {
            return Ok(DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc));
        }
    }

    anyhow::bail!(
        "Failed to parse date: {}. Use YYYY-MM-DD or YYYY-MM-DD HH:MM:SS format",
        date_str
    )
}

/// Load the configured symbol's bars, applying the configured date range
pub fn load_symbol(config: &BacktestConfig, symbol: &Symbol) -> Result<Vec<Candle>> {
    let path = config.data_path(symbol);
    let candles =
        load_csv(&path).with_context(|| format!("Failed to load data for {}", symbol))?;
    let original_len = candles.len();

    let start = config.start.as_deref().map(parse_date).transpose()?;
    let end = config.end.as_deref().map(parse_date).transpose()?;
    let candles = filter_candles_by_date(candles, start, end);

    if start.is_some() || end.is_some() {
        info!(
            "Loaded {} candles for {} (filtered from {} total)",
            candles.len(),
            symbol,
            original_len
        );
    } else {
        info!("Loaded {} candles for {}", candles.len(), symbol);
    }

    if candles.is_empty() {
        anyhow::bail!("No data loaded for {}", symbol);
    }

    Ok(candles)
}
