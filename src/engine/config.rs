//! Breakout engine configuration

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Smallest allowed breakout lookback in days (default: 5)
    pub floor: usize,

    /// Largest allowed breakout lookback in days (default: 30)
    pub ceiling: usize,

    /// Lookback before the first resize (default: 20)
    pub initial_lookback: usize,

    /// Initial stop as a fraction of the breakout level (default: 0.95)
    pub initial_stop_risk: f64,

    /// Trailing stop as a fraction of the latest high close (default: 0.8)
    pub trailing_stop_risk: f64,

    /// Days in each volatility sample (default: 30). Resizing reads one extra close.
    pub volatility_window: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            floor: 5,
            ceiling: 30,
            initial_lookback: 20,
            initial_stop_risk: 0.95,
            trailing_stop_risk: 0.8,
            volatility_window: 30,
        }
    }
}

impl EngineConfig {
    /// Number of closes the lookback resize needs
    pub fn close_history_len(&self) -> usize {
        self.volatility_window + 1
    }

    pub fn validate(&self) -> Result<()> {
        // The breakout rule compares against all highs but the latest one
        if self.floor < 2 {
            return Err(EngineError::invalid_config(format!(
                "floor must be at least 2, got {}",
                self.floor
            )));
        }
        if self.floor > self.ceiling {
            return Err(EngineError::invalid_config(format!(
                "floor ({}) must not exceed ceiling ({})",
                self.floor, self.ceiling
            )));
        }
        if !(self.floor..=self.ceiling).contains(&self.initial_lookback) {
            return Err(EngineError::invalid_config(format!(
                "initial_lookback ({}) must be within [{}, {}]",
                self.initial_lookback, self.floor, self.ceiling
            )));
        }
        for (name, value) in [
            ("initial_stop_risk", self.initial_stop_risk),
            ("trailing_stop_risk", self.trailing_stop_risk),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(EngineError::invalid_config(format!(
                    "{} must be in (0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.volatility_window < 2 {
            return Err(EngineError::invalid_config(format!(
                "volatility_window must be at least 2, got {}",
                self.volatility_window
            )));
        }
        Ok(())
    }
}
