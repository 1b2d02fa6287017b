//! Volatility-driven lookback resizing
//!
//! The breakout window grows when realized volatility rises and shrinks when it
//! falls. Volatility is the population standard deviation of closes over
//! `window` days, measured today and one day earlier.

use crate::error::{EngineError, Result};
use crate::indicators::std_dev;

/// Today's and yesterday's realized volatility
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolatilityPair {
    pub today: f64,
    pub yesterday: f64,
}

/// Measure volatility from the most recent `window + 1` closes (oldest-first).
pub fn measure_volatility(closes: &[f64], window: usize) -> Result<VolatilityPair> {
    let required = window + 1;
    if closes.len() < required {
        return Err(EngineError::history(required, closes.len()));
    }
    let recent = &closes[closes.len() - required..];
    EngineError::ensure_finite(recent, "close history")?;

    let today = std_dev(&recent[1..]).ok_or_else(|| EngineError::history(required, 0))?;
    let yesterday =
        std_dev(&recent[..window]).ok_or_else(|| EngineError::history(required, 0))?;

    Ok(VolatilityPair { today, yesterday })
}

/// Normalized day-over-day volatility change: `(today - yesterday) / today`.
pub fn volatility_delta(vol: VolatilityPair) -> Result<f64> {
    if vol.today == 0.0 {
        return Err(EngineError::division_by_zero("volatility delta"));
    }
    Ok((vol.today - vol.yesterday) / vol.today)
}

/// Scale `current` by `1 + delta`, round half to even, and clamp to `[floor, ceiling]`.
///
/// A non-finite delta leaves `current` unchanged (still clamped).
pub fn resized_lookback(current: usize, delta: f64, floor: usize, ceiling: usize) -> usize {
    let raw = (current as f64 * (1.0 + delta)).round_ties_even();
    if !raw.is_finite() {
        return current.clamp(floor, ceiling);
    }
    raw.clamp(floor as f64, ceiling as f64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_uses_most_recent_window() {
        // Extra leading values must be ignored
        let mut closes = vec![1000.0, 1000.0];
        closes.extend((0..31).map(|i| 100.0 + i as f64));
        let vol = measure_volatility(&closes, 30).unwrap();
        // Both windows are 30 consecutive integers, so spreads match
        assert!((vol.today - vol.yesterday).abs() < 1e-9);
        assert!(vol.today > 0.0);
    }

    #[test]
    fn test_measure_rejects_short_history() {
        let closes = vec![100.0; 30];
        assert_eq!(
            measure_volatility(&closes, 30),
            Err(EngineError::InvalidHistoryLength {
                required: 31,
                actual: 30
            })
        );
    }

    #[test]
    fn test_delta_zero_volatility_is_division_by_zero() {
        let vol = VolatilityPair {
            today: 0.0,
            yesterday: 0.0,
        };
        assert!(matches!(
            volatility_delta(vol),
            Err(EngineError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn test_delta_sign() {
        let rising = VolatilityPair {
            today: 2.0,
            yesterday: 1.0,
        };
        assert_eq!(volatility_delta(rising).unwrap(), 0.5);

        let falling = VolatilityPair {
            today: 1.0,
            yesterday: 2.0,
        };
        assert_eq!(volatility_delta(falling).unwrap(), -1.0);
    }

    #[test]
    fn test_resize_clamps_to_ceiling() {
        assert_eq!(resized_lookback(20, 0.5, 5, 30), 30);
        assert_eq!(resized_lookback(20, 1.0, 5, 30), 30);
    }

    #[test]
    fn test_resize_clamps_to_floor() {
        assert_eq!(resized_lookback(6, -0.5, 5, 30), 5);
        // Extreme negative deltas must not wrap around
        assert_eq!(resized_lookback(20, -10.0, 5, 30), 5);
    }

    #[test]
    fn test_measure_rejects_nan_close() {
        let mut closes = vec![100.0; 30];
        closes.push(f64::NAN);
        assert!(matches!(
            measure_volatility(&closes, 30),
            Err(EngineError::NonFinitePrice { .. })
        ));
    }

    #[test]
    fn test_resize_non_finite_delta_keeps_current() {
        assert_eq!(resized_lookback(20, f64::NAN, 5, 30), 20);
        assert_eq!(resized_lookback(20, f64::INFINITY, 5, 30), 20);
        assert_eq!(resized_lookback(40, f64::NAN, 5, 30), 30);
    }

    #[test]
    fn test_resize_rounds_half_to_even() {
        // 10 * 1.25 = 12.5 -> 12, 10 * 1.35 = 13.5 -> 14
        assert_eq!(resized_lookback(10, 0.25, 5, 30), 12);
        assert_eq!(resized_lookback(10, 0.35, 5, 30), 14);
    }
}
