//! Adaptive Breakout
//!
//! A single-instrument breakout strategy whose lookback window adapts to
//! realized volatility, with an initial stop that turns into a ratcheting
//! trailing stop.
//!
//! The [`engine`] module holds the decision logic; it is driven once per
//! trading session through the [`host::PriceFeed`] and [`host::Broker`]
//! traits. [`backtest`] provides a daily-bar host, [`optimizer`] runs
//! parameter grids over it.
//!
//! ```no_run
//! use adaptive_breakout::backtest::Backtester;
//! use adaptive_breakout::{data, Config};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::from_file("configs/wmt_1d.json")?;
//!     let candles = data::load_csv("data/WMT_1d.csv")?;
//!     let result = Backtester::new(config).run(&candles)?;
//!     println!("Return: {:.2}%", result.metrics.total_return);
//!     Ok(())
//! }
//! ```

pub mod backtest;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod host;
pub mod indicators;
pub mod optimizer;
pub mod types;

pub use config::Config;
pub use engine::{BreakoutStopEngine, EngineConfig, EntryIntent, SessionReport, StopState};
pub use error::EngineError;
pub use types::*;
