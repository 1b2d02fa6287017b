//! Backtest command implementation

use adaptive_breakout::backtest::{BacktestResult, Backtester};
use adaptive_breakout::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub fn run(
    config_path: String,
    data_path: Option<PathBuf>,
    capital_override: Option<f64>,
    start_override: Option<String>,
    end_override: Option<String>,
    export: bool,
    export_dir: Option<PathBuf>,
) -> Result<()> {
    info!("Starting backtest");

    let mut config = Config::from_file(&config_path)?;
    info!("Loaded configuration from: {}", config_path);

    if let Some(capital) = capital_override {
        info!("Overriding initial capital to: ${:.2}", capital);
        config.trading.initial_capital = capital;
    }
    if start_override.is_some() {
        config.backtest.start = start_override;
    }
    if end_override.is_some() {
        config.backtest.end = end_override;
    }

    let candles = super::load_candles(&config, data_path)?;
    info!("Loaded {} bars for {}", candles.len(), config.trading.symbol);

    info!("Running backtest...");
    let result = Backtester::new(config.clone()).run(&candles)?;

    print_results(&config, &result);

    if let Some(dir) = resolve_export_dir(&config, export, export_dir) {
        self::export(&dir, &result)?;
        info!("Exported trades and sessions to {}", dir.display());
    }

    info!("Backtest completed successfully");

    Ok(())
}

/// Explicit directory wins; `--export` alone uses `backtest.results_dir`
fn resolve_export_dir(config: &Config, export: bool, export_dir: Option<PathBuf>) -> Option<PathBuf> {
    export_dir.or_else(|| export.then(|| PathBuf::from(&config.backtest.results_dir)))
}

fn print_results(config: &Config, result: &BacktestResult) {
    let m = &result.metrics;
    let final_lookback = result.sessions.last().map_or(0, |s| s.lookback);

    let equity = result.equity_curve();
    let final_equity = equity
        .last()
        .map_or(config.trading.initial_capital, |(_, e)| *e);
    let peak_equity = equity
        .iter()
        .map(|(_, e)| *e)
        .fold(config.trading.initial_capital, f64::max);

    let avg_trade_return = if result.trades.is_empty() {
        0.0
    } else {
        result.trades.iter().map(|t| t.return_pct()).sum::<f64>() / result.trades.len() as f64
    };

    println!("\n{}", "=".repeat(60));
    println!("BACKTEST RESULTS: {}", config.trading.symbol);
    println!("{}", "=".repeat(60));
    println!("Initial Capital:    ${:.2}", config.trading.initial_capital);
    println!("Final Equity:       ${:.2}", final_equity);
    println!("Peak Equity:        ${:.2}", peak_equity);
    println!("Total Return:       {:.2}%", m.total_return);
    println!("Sharpe Ratio:       {:.2}", m.sharpe_ratio);
    println!("Max Drawdown:       {:.2}%", m.max_drawdown);
    println!("Win Rate:           {:.2}%", m.win_rate);
    println!("Profit Factor:      {:.2}", m.profit_factor);
    println!("Total Trades:       {}", m.total_trades);
    println!("Winning Trades:     {}", m.winning_trades);
    println!("Losing Trades:      {}", m.losing_trades);
    println!("Average Win:        ${:.2}", m.avg_win);
    println!("Average Loss:       ${:.2}", m.avg_loss);
    println!("Largest Win:        ${:.2}", m.largest_win);
    println!("Largest Loss:       ${:.2}", m.largest_loss);
    println!("Avg Trade Return:   {:.2}%", avg_trade_return);
    println!("{}", "-".repeat(60));
    println!("Total Commission:   ${:.2}", m.total_commission);
    println!("Final Lookback:     {} days", final_lookback);
    println!("{}", "=".repeat(60));
}

fn export(dir: &Path, result: &BacktestResult) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut trades = csv::Writer::from_path(dir.join("trades.csv"))?;
    for trade in &result.trades {
        trades.serialize(trade)?;
    }
    trades.flush()?;

    let mut sessions = csv::Writer::from_path(dir.join("sessions.csv"))?;
    for session in &result.sessions {
        sessions.serialize(session)?;
    }
    sessions.flush()?;

    Ok(())
}
