//! CLI subcommands

pub mod backtest;
pub mod optimize;

use adaptive_breakout::{data, Candle, Config};
use anyhow::Result;
use std::path::PathBuf;
use tracing::info;

/// Load bars from an explicit CSV path, or from the configured data directory
fn load_candles(config: &Config, data_path: Option<PathBuf>) -> Result<Vec<Candle>> {
    let symbol = config.trading.symbol();
    match data_path {
        Some(path) => {
            info!("Loading data from: {}", path.display());
            let candles = data::load_csv(&path)?;
            let start = config.backtest.start.as_deref().map(data::parse_date).transpose()?;
            let end = config.backtest.end.as_deref().map(data::parse_date).transpose()?;
            let candles = data::filter_candles_by_date(candles, start, end);
            if candles.is_empty() {
                anyhow::bail!("No data loaded for {} from {}", symbol, path.display());
            }
            Ok(candles)
        }
        None => {
            info!("Loading data from: {}", config.backtest.data_dir);
            data::load_symbol(&config.backtest, &symbol)
        }
    }
}
