//! Optimize command implementation with progress tracking

use adaptive_breakout::optimizer::{GridParams, Optimizer};
use adaptive_breakout::Config;
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::info;

pub fn run(
    config_path: String,
    data_path: Option<PathBuf>,
    sort_by: String,
    top: usize,
    full: bool,
    sequential: bool,
) -> Result<()> {
    info!("Starting optimization");

    let config = Config::from_file(&config_path)?;
    info!("Loaded configuration from: {}", config_path);

    let candles = super::load_candles(&config, data_path)?;

    let grid = match (&config.grid, full) {
        (Some(grid), _) => grid.clone(),
        (None, true) => GridParams::full(),
        (None, false) => GridParams::quick(),
    };
    let configs = grid.generate_configs(&config);
    info!(
        "Grid has {} combinations, {} valid",
        grid.total_combinations(),
        configs.len()
    );
    if configs.is_empty() {
        anyhow::bail!("No valid parameter combinations in grid");
    }

    let pb = ProgressBar::new(configs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let mut results = if sequential {
        Optimizer::optimize_sequential(&candles, &configs, Some(&pb))
    } else {
        Optimizer::optimize(&candles, &configs, Some(&pb))
    };
    pb.finish_with_message("done");

    Optimizer::sort_results(&mut results, &sort_by);

    println!("\n{}", "=".repeat(90));
    println!(
        "TOP {} RESULTS FOR {} (sorted by {})",
        top.min(results.len()),
        config.trading.symbol,
        sort_by
    );
    println!("{}", "=".repeat(90));
    println!(
        "{:<4} {:<30} {:>8} {:>10} {:>8} {:>8} {:>7}",
        "#", "Params", "Sharpe", "Return%", "MaxDD%", "WinRate", "Trades"
    );
    println!("{}", "-".repeat(90));
    for (rank, r) in results.iter().take(top).enumerate() {
        println!(
            "{:<4} {:<30} {:>8.2} {:>10.2} {:>8.2} {:>7.1}% {:>7}",
            rank + 1,
            r.format_params(),
            r.sharpe_ratio,
            r.total_return,
            r.max_drawdown,
            r.win_rate,
            r.total_trades
        );
    }
    println!("{}", "=".repeat(90));

    if let Some(best) = results.first() {
        info!(
            params = %best.format_params(),
            sharpe = best.sharpe_ratio,
            total_return = best.total_return,
            "Best combination"
        );
    }

    Ok(())
}
