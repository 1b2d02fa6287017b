//! Parameter grid search
//!
//! Every combination gets its own engine and backtest, so combinations run in
//! parallel without sharing state.

use indicatif::ProgressBar;
use itertools::iproduct;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::backtest::Backtester;
use crate::{Candle, Config, EngineConfig};

/// Values to sweep for each engine parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridParams {
    pub initial_lookbacks: Vec<usize>,
    pub initial_stop_risks: Vec<f64>,
    pub trailing_stop_risks: Vec<f64>,
}

impl GridParams {
    /// Quick: 3×3×3 = 27 combinations
    pub fn quick() -> Self {
        Self {
            initial_lookbacks: vec![10, 20, 30],
            initial_stop_risks: vec![0.90, 0.95, 0.98],
            trailing_stop_risks: vec![0.8, 0.85, 0.9],
        }
    }

    /// Full: 5×4×5 = 100 combinations
    pub fn full() -> Self {
        Self {
            initial_lookbacks: vec![5, 10, 15, 20, 30],
            initial_stop_risks: vec![0.90, 0.93, 0.95, 0.98],
            trailing_stop_risks: vec![0.75, 0.8, 0.85, 0.9, 0.95],
        }
    }

    /// One config per combination; combinations the engine would reject are dropped
    pub fn generate_configs(&self, base: &Config) -> Vec<Config> {
        iproduct!(
            &self.initial_lookbacks,
            &self.initial_stop_risks,
            &self.trailing_stop_risks
        )
        .filter_map(|(&lookback, &initial, &trailing)| {
            let mut config = base.clone();
            config.engine = EngineConfig {
                initial_lookback: lookback,
                initial_stop_risk: initial,
                trailing_stop_risk: trailing,
                ..base.engine.clone()
            };
            match config.engine.validate() {
                Ok(()) => Some(config),
                Err(e) => {
                    tracing::debug!("Skipping grid point: {}", e);
                    None
                }
            }
        })
        .collect()
    }

    pub fn total_combinations(&self) -> usize {
        self.initial_lookbacks.len()
            * self.initial_stop_risks.len()
            * self.trailing_stop_risks.len()
    }
}

/// Optimization result for a single parameter combination
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationResult {
    pub engine: EngineConfig,
    pub sharpe_ratio: f64,
    pub total_return: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub total_trades: usize,
    pub profit_factor: f64,
}

impl OptimizationResult {
    /// Short parameter label for tables
    pub fn format_params(&self) -> String {
        format!(
            "LB:{} Init:{:.2} Trail:{:.2}",
            self.engine.initial_lookback,
            self.engine.initial_stop_risk,
            self.engine.trailing_stop_risk
        )
    }
}

fn evaluate(config: &Config, candles: &[Candle]) -> Option<OptimizationResult> {
    match Backtester::new(config.clone()).run(candles) {
        Ok(result) => Some(OptimizationResult {
            engine: config.engine.clone(),
            sharpe_ratio: result.metrics.sharpe_ratio,
            total_return: result.metrics.total_return,
            max_drawdown: result.metrics.max_drawdown,
            win_rate: result.metrics.win_rate,
            total_trades: result.metrics.total_trades,
            profit_factor: result.metrics.profit_factor,
        }),
        Err(e) => {
            tracing::warn!(params = ?config.engine, "Backtest failed: {:#}", e);
            None
        }
    }
}

pub struct Optimizer;

impl Optimizer {
    /// Run all configs in parallel, ticking `progress_bar` per finished run
    pub fn optimize(
        candles: &[Candle],
        configs: &[Config],
        progress_bar: Option<&ProgressBar>,
    ) -> Vec<OptimizationResult> {
        tracing::info!("Testing {} parameter combinations", configs.len());

        configs
            .par_iter()
            .filter_map(|config| {
                let result = evaluate(config, candles);
                if let Some(pb) = progress_bar {
                    pb.inc(1);
                }
                result
            })
            .collect()
    }

    /// Run optimization sequentially (no parallelism)
    pub fn optimize_sequential(
        candles: &[Candle],
        configs: &[Config],
        progress_bar: Option<&ProgressBar>,
    ) -> Vec<OptimizationResult> {
        tracing::info!(
            "Testing {} parameter combinations sequentially",
            configs.len()
        );

        configs
            .iter()
            .filter_map(|config| {
                let result = evaluate(config, candles);
                if let Some(pb) = progress_bar {
                    pb.inc(1);
                }
                result
            })
            .collect()
    }

    /// Sort optimization results by specified metric, best first
    pub fn sort_results(results: &mut [OptimizationResult], sort_by: &str) {
        let key = |r: &OptimizationResult| match sort_by {
            "return" => r.total_return,
            "win_rate" => r.win_rate,
            "profit_factor" => r.profit_factor,
            "drawdown" => -r.max_drawdown,
            _ => r.sharpe_ratio,
        };
        results.sort_by(|a, b| {
            key(b)
                .partial_cmp(&key(a))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(sharpe: f64, ret: f64) -> OptimizationResult {
        OptimizationResult {
            engine: EngineConfig::default(),
            sharpe_ratio: sharpe,
            total_return: ret,
            max_drawdown: 10.0,
            win_rate: 50.0,
            total_trades: 4,
            profit_factor: 1.2,
        }
    }

    #[test]
    fn test_quick_grid_configs() {
        let grid = GridParams::quick();
        let configs = grid.generate_configs(&Config::default());
        assert_eq!(configs.len(), grid.total_combinations());
        assert_eq!(configs.len(), 27);
    }

    #[test]
    fn test_invalid_grid_points_dropped() {
        let grid = GridParams {
            initial_lookbacks: vec![2, 20, 40],
            initial_stop_risks: vec![0.95],
            trailing_stop_risks: vec![0.8],
        };
        let configs = grid.generate_configs(&Config::default());
        // 2 and 40 fall outside [5, 30]
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].engine.initial_lookback, 20);
    }

    #[test]
    fn test_sort_results() {
        let mut results = vec![result(0.5, 30.0), result(1.5, 10.0), result(1.0, 20.0)];

        Optimizer::sort_results(&mut results, "sharpe");
        assert_eq!(results[0].sharpe_ratio, 1.5);

        Optimizer::sort_results(&mut results, "return");
        assert_eq!(results[0].total_return, 30.0);
    }
}
