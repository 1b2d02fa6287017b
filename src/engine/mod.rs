//! Adaptive breakout decision engine
//!
//! One engine instance trades one instrument. Each session the host calls
//! [`BreakoutStopEngine::on_market_open`] (or the three rules individually):
//!
//! 1. resize the breakout lookback from the change in 30-day volatility,
//! 2. enter a full position when the latest close reaches the highest high of
//!    the lookback window (excluding the latest bar),
//! 3. place the initial stop and ratchet it upward behind new highs.
//!
//! All state lives in the engine value; nothing is global.

pub mod config;
pub mod lookback;
pub mod stop;

pub use config::EngineConfig;
pub use lookback::{measure_volatility, resized_lookback, volatility_delta, VolatilityPair};
pub use stop::StopState;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};
use crate::host::{Broker, PriceFeed};
use crate::indicators::prior_high;
use crate::{Intent, PositionState};

/// Breakout entry decision
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntryIntent {
    /// Share of portfolio value to commit (always the full position)
    pub quantity_fraction: f64,
    /// Breakout level the initial stop is derived from
    pub stop_seed_price: f64,
}

/// What happened during one `on_market_open` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub lookback: usize,
    /// `None` when today's volatility was zero and the lookback was kept
    pub volatility_delta: Option<f64>,
    pub intents: Vec<Intent>,
    pub position: PositionState,
    pub stop_price: Option<f64>,
}

pub struct BreakoutStopEngine {
    config: EngineConfig,
    lookback: usize,
    position: PositionState,
    stop: Option<StopState>,
}

impl BreakoutStopEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            lookback: config.initial_lookback,
            config,
            position: PositionState::Flat,
            stop: None,
        })
    }

    /// Rebuild an engine that is already holding a position, e.g. after a host restart
    pub fn resume(config: EngineConfig, lookback: usize, stop: StopState) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            lookback: lookback.clamp(config.floor, config.ceiling),
            config,
            position: PositionState::Long,
            stop: Some(stop),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }

    pub fn position(&self) -> PositionState {
        self.position
    }

    pub fn stop_state(&self) -> Option<&StopState> {
        self.stop.as_ref()
    }

    /// Recompute the lookback from the most recent `volatility_window + 1` closes.
    ///
    /// Zero volatility today leaves the lookback unchanged.
    pub fn resize_lookback(&mut self, closes: &[f64]) -> Result<usize> {
        self.resize(closes).map(|(lookback, _)| lookback)
    }

    fn resize(&mut self, closes: &[f64]) -> Result<(usize, Option<f64>)> {
        let vol = measure_volatility(closes, self.config.volatility_window)?;

        let delta = match volatility_delta(vol) {
            Ok(delta) => delta,
            Err(EngineError::DivisionByZero { .. }) => {
                debug!(lookback = self.lookback, "Zero volatility, lookback unchanged");
                return Ok((self.lookback, None));
            }
            Err(e) => return Err(e),
        };

        let previous = self.lookback;
        self.lookback =
            resized_lookback(previous, delta, self.config.floor, self.config.ceiling);

        debug!(
            today_vol = vol.today,
            yesterday_vol = vol.yesterday,
            delta,
            previous,
            lookback = self.lookback,
            "Lookback resized"
        );

        Ok((self.lookback, Some(delta)))
    }

    /// Check the breakout rule against the most recent `lookback` highs.
    ///
    /// Returns `None` while long or when the close is below the prior high.
    pub fn evaluate_entry(
        &mut self,
        current_close: f64,
        highs: &[f64],
    ) -> Result<Option<EntryIntent>> {
        if highs.len() < self.lookback {
            return Err(EngineError::history(self.lookback, highs.len()));
        }
        if self.position == PositionState::Long {
            return Ok(None);
        }

        let window = &highs[highs.len() - self.lookback..];
        EngineError::ensure_finite(&[current_close], "current close")?;
        EngineError::ensure_finite(window, "high history")?;
        let breakout_level =
            prior_high(window).ok_or_else(|| EngineError::history(2, window.len()))?;

        if current_close < breakout_level {
            return Ok(None);
        }

        self.position = PositionState::Long;
        self.stop = Some(StopState::new(breakout_level));

        info!(
            close = current_close,
            breakout_level,
            lookback = self.lookback,
            "Breakout detected"
        );

        Ok(Some(EntryIntent {
            quantity_fraction: 1.0,
            stop_seed_price: breakout_level,
        }))
    }

    /// Place a stop if none is resting, then try to ratchet it.
    ///
    /// Both can happen in the same call; intents come back in execution order.
    /// A stop re-placed after a ratchet keeps its raised level.
    pub fn manage_stop(
        &mut self,
        current_close: f64,
        has_open_stop_order: bool,
        held_quantity: f64,
    ) -> Result<Vec<Intent>> {
        if self.position != PositionState::Long {
            return Err(EngineError::NotInvested);
        }
        EngineError::ensure_finite(&[current_close], "current close")?;
        let stop = self.stop.as_mut().ok_or(EngineError::NotInvested)?;
        let mut intents = Vec::new();

        if !has_open_stop_order {
            let trigger_price = stop.place(self.config.initial_stop_risk);
            info!(
                quantity = held_quantity,
                trigger_price,
                breakout_level = stop.breakout_level(),
                "Placing stop"
            );
            intents.push(Intent::PlaceStopOrder {
                quantity: held_quantity,
                trigger_price,
            });
        }

        if let Some(trigger_price) = stop.ratchet(current_close, self.config.trailing_stop_risk) {
            info!(
                close = current_close,
                trigger_price, "Trailing stop raised"
            );
            intents.push(Intent::UpdateStopOrder { trigger_price });
        }

        Ok(intents)
    }

    /// Reconcile with the holdings the host reports.
    ///
    /// A long engine whose host holds nothing (stop filled) goes flat and
    /// drops its stop state.
    pub fn sync_position(&mut self, held_quantity: f64) {
        match (self.position, held_quantity > 0.0) {
            (PositionState::Long, false) => {
                info!(
                    stop_price = self.stop.and_then(|s| s.current_stop_price()),
                    "Position closed by host, engine flat"
                );
                self.position = PositionState::Flat;
                self.stop = None;
            }
            (PositionState::Flat, true) => {
                warn!(
                    quantity = held_quantity,
                    "Host holds shares the engine did not enter"
                );
            }
            _ => {}
        }
    }

    /// Run one full session against the host.
    pub fn on_market_open<F, B>(&mut self, feed: &F, broker: &mut B) -> anyhow::Result<SessionReport>
    where
        F: PriceFeed + ?Sized,
        B: Broker + ?Sized,
    {
        self.sync_position(broker.position_quantity());

        let closes = feed.close_history(self.config.close_history_len())?;
        let (lookback, delta) = self.resize(&closes)?;

        let highs = feed.high_history(lookback)?;
        let close = feed.current_close()?;
        let mut intents = Vec::new();

        // Untracked holdings block new entries
        if self.position == PositionState::Flat && broker.position_quantity() <= 0.0 {
            if self.evaluate_entry(close, &highs)?.is_some() {
                broker.execute(&Intent::EnterFullPosition)?;
                intents.push(Intent::EnterFullPosition);
                // An entry the host could not fill leaves the engine flat
                self.sync_position(broker.position_quantity());
            }
        }

        if self.position == PositionState::Long {
            let stop_intents =
                self.manage_stop(close, broker.has_open_stop_order(), broker.position_quantity())?;
            for intent in &stop_intents {
                broker.execute(intent)?;
            }
            intents.extend(stop_intents);
        }

        Ok(SessionReport {
            lookback,
            volatility_delta: delta,
            intents,
            position: self.position,
            stop_price: self.stop.and_then(|s| s.current_stop_price()),
        })
    }
}
