//! Configuration management
//!
//! Loads the JSON run configuration: engine parameters, trading account
//! settings, backtest paths and an optional optimization grid.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::engine::EngineConfig;
use crate::optimizer::GridParams;
use crate::Symbol;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub trading: TradingConfig,
    pub backtest: BacktestConfig,
    /// Grid search parameters for optimization (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid: Option<GridParams>,
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;

        config.engine.validate().context("Invalid engine section")?;

        Ok(config)
    }
}

/// Trading account configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    pub symbol: String,
    pub initial_capital: f64,
    /// Commission as a fraction of traded value, charged on entry and exit
    pub commission: f64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        TradingConfig {
            symbol: "WMT".to_string(),
            initial_capital: 100_000.0,
            commission: 0.0005,
        }
    }
}

impl TradingConfig {
    pub fn symbol(&self) -> Symbol {
        Symbol::new(self.symbol.clone())
    }
}

/// Backtest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub data_dir: String,
    pub results_dir: String,
    pub timeframe: String,
    /// Inclusive start date (YYYY-MM-DD)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    /// Inclusive end date (YYYY-MM-DD)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            data_dir: "data".to_string(),
            results_dir: "results".to_string(),
            timeframe: "1d".to_string(),
            start: None,
            end: None,
        }
    }
}

impl BacktestConfig {
    /// Path of the CSV holding `symbol` bars: `{data_dir}/{symbol}_{timeframe}.csv`
    pub fn data_path(&self, symbol: &Symbol) -> std::path::PathBuf {
        Path::new(&self.data_dir).join(format!("{}_{}.csv", symbol.as_str(), self.timeframe))
    }
}
