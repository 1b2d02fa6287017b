//! Stop-loss state for an open breakout position
//!
//! A position starts with no resting stop. The first stop sits at
//! `initial_stop_risk * breakout_level`; afterwards it only ever moves up, to
//! `trailing_stop_risk` times each new high close.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopState {
    breakout_level: f64,
    highest_price_seen: f64,
    current_stop_price: Option<f64>,
}

impl StopState {
    /// Fresh state right after a breakout entry
    pub fn new(breakout_level: f64) -> Self {
        Self {
            breakout_level,
            highest_price_seen: breakout_level,
            current_stop_price: None,
        }
    }

    /// Rebuild the state of a position that already has a resting stop
    pub fn resume(breakout_level: f64, highest_price_seen: f64, current_stop_price: f64) -> Self {
        Self {
            breakout_level,
            highest_price_seen,
            current_stop_price: Some(current_stop_price),
        }
    }

    pub fn breakout_level(&self) -> f64 {
        self.breakout_level
    }

    pub fn highest_price_seen(&self) -> f64 {
        self.highest_price_seen
    }

    /// `None` until the initial stop has been placed
    pub fn current_stop_price(&self) -> Option<f64> {
        self.current_stop_price
    }

    /// Trigger price for a new stop order. The first placement sits at
    /// `initial_stop_risk * breakout_level`; a re-placement keeps any higher
    /// level the stop has already reached.
    pub fn place(&mut self, initial_stop_risk: f64) -> f64 {
        let initial = initial_stop_risk * self.breakout_level;
        let price = self
            .current_stop_price
            .map_or(initial, |current| current.max(initial));
        self.current_stop_price = Some(price);
        price
    }

    /// Raise the stop when `close` makes a new high and the trailed level beats
    /// the current stop. Returns the new trigger price when the stop moved.
    pub fn ratchet(&mut self, close: f64, trailing_stop_risk: f64) -> Option<f64> {
        let current = self.current_stop_price?;
        let trailed = close * trailing_stop_risk;

        if close > self.highest_price_seen && current < trailed {
            self.highest_price_seen = close;
            self.current_stop_price = Some(trailed);
            Some(trailed)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_new_seeds_highest_with_breakout() {
        let stop = StopState::new(15.0);
        assert_eq!(stop.highest_price_seen(), 15.0);
        assert_eq!(stop.current_stop_price(), None);
    }

    #[test]
    fn test_initial_stop_below_breakout() {
        let mut stop = StopState::new(15.0);
        let price = stop.place(0.95);
        assert_relative_eq!(price, 14.25, epsilon = 1e-12);
        assert_eq!(stop.current_stop_price(), Some(price));
    }

    #[test]
    fn test_replace_keeps_raised_stop() {
        let mut stop = StopState::new(15.0);
        stop.place(0.95);
        assert_relative_eq!(stop.ratchet(21.0, 0.8).unwrap(), 16.8, epsilon = 1e-12);

        // Resting order vanished; the new one must not fall back to 14.25
        let price = stop.place(0.95);
        assert_relative_eq!(price, 16.8, epsilon = 1e-12);
        assert_eq!(stop.place(0.95), price);
    }

    #[test]
    fn test_ratchet_requires_placed_stop() {
        let mut stop = StopState::new(15.0);
        assert_eq!(stop.ratchet(100.0, 0.8), None);
        assert_eq!(stop.highest_price_seen(), 15.0);
    }

    #[test]
    fn test_ratchet_moves_up_on_new_high() {
        let mut stop = StopState::resume(15.0, 20.0, 16.0);
        let new = stop.ratchet(21.0, 0.8).unwrap();
        assert_relative_eq!(new, 16.8, epsilon = 1e-12);
        assert_eq!(stop.highest_price_seen(), 21.0);
    }

    #[test]
    fn test_ratchet_ignores_lower_close() {
        let mut stop = StopState::resume(15.0, 20.0, 16.0);
        assert_eq!(stop.ratchet(19.0, 0.8), None);
        assert_eq!(stop.current_stop_price(), Some(16.0));
    }

    #[test]
    fn test_new_high_without_stop_gain_keeps_highest() {
        // 20.1 is a new high but 20.1 * 0.8 = 16.08 < 16.5
        let mut stop = StopState::resume(15.0, 20.0, 16.5);
        assert_eq!(stop.ratchet(20.1, 0.8), None);
        assert_eq!(stop.highest_price_seen(), 20.0);
        assert_eq!(stop.current_stop_price(), Some(16.5));
    }
}
