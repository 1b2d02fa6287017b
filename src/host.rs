//! Host seams of the breakout engine
//!
//! A host (backtester or live runtime) implements [`PriceFeed`] to supply
//! daily history and [`Broker`] to report holdings and carry out intents.
//! The engine never talks to a market directly.
//!
//! Fill reconciliation is the host's job: once a stop order fills, the host
//! must report a zero `position_quantity()`. The engine drops its stop state
//! at the start of the next session when it sees that.

use anyhow::Result;

use crate::Intent;

/// Daily price history, oldest-first, gap-free trading days
pub trait PriceFeed {
    /// The `n` most recent daily closes
    fn close_history(&self, n: usize) -> Result<Vec<f64>>;

    /// The `n` most recent daily highs
    fn high_history(&self, n: usize) -> Result<Vec<f64>>;

    /// Latest close the strategy should act on
    fn current_close(&self) -> Result<f64>;
}

/// Holdings queries and intent execution
pub trait Broker {
    /// Shares currently held (0 when flat)
    fn position_quantity(&self) -> f64;

    /// Whether a stop order for the instrument is resting
    fn has_open_stop_order(&self) -> bool;

    /// Carry out an intent. Entries are expected to fill before this returns so
    /// the engine can size the protective stop in the same session.
    fn execute(&mut self, intent: &Intent) -> Result<()>;
}
