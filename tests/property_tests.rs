//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. Lookback bounds: resizing never leaves [floor, ceiling]
//! 2. Lookback direction: rising volatility never shrinks the window
//! 3. Breakout rule: entry fires exactly when close >= prior high
//! 4. Ratchet monotonicity: the stop and the tracked high never move down

use proptest::prelude::*;

use adaptive_breakout::engine::{resized_lookback, BreakoutStopEngine, EngineConfig, StopState};
use adaptive_breakout::indicators::prior_high;
use adaptive_breakout::Intent;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (10.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_bounds() -> impl Strategy<Value = (usize, usize)> {
    (2usize..20).prop_flat_map(|floor| (Just(floor), floor..60))
}

// ── 1. Lookback Bounds ───────────────────────────────────────────────

proptest! {
    #[test]
    fn resized_lookback_within_bounds(
        (floor, ceiling) in arb_bounds(),
        current in 0usize..100,
        delta in -50.0..50.0_f64,
    ) {
        let lookback = resized_lookback(current, delta, floor, ceiling);
        prop_assert!(lookback >= floor && lookback <= ceiling);
    }

    /// Repeated resizing over arbitrary close paths stays in bounds.
    #[test]
    fn engine_lookback_within_bounds(closes in prop::collection::vec(arb_price(), 31..120)) {
        let mut engine = BreakoutStopEngine::new(EngineConfig::default()).unwrap();
        for end in 31..=closes.len() {
            let lookback = engine.resize_lookback(&closes[..end]).unwrap();
            prop_assert!((5..=30).contains(&lookback));
            prop_assert_eq!(lookback, engine.lookback());
        }
    }
}

// ── 2. Lookback Direction ────────────────────────────────────────────

proptest! {
    #[test]
    fn rising_volatility_never_shrinks(current in 5usize..=30, delta in 0.0..5.0_f64) {
        prop_assert!(resized_lookback(current, delta, 5, 30) >= current);
    }

    #[test]
    fn falling_volatility_never_grows(current in 5usize..=30, delta in -5.0..=0.0_f64) {
        prop_assert!(resized_lookback(current, delta, 5, 30) <= current);
    }
}

// ── 3. Breakout Rule ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn entry_iff_close_reaches_prior_high(
        highs in prop::collection::vec(arb_price(), 20..40),
        close in arb_price(),
    ) {
        let mut engine = BreakoutStopEngine::new(EngineConfig::default()).unwrap();
        let window = &highs[highs.len() - 20..];
        let level = prior_high(window).unwrap();

        let entry = engine.evaluate_entry(close, &highs).unwrap();
        prop_assert_eq!(entry.is_some(), close >= level);
        if let Some(entry) = entry {
            prop_assert_eq!(entry.stop_seed_price, level);
        }
    }

    /// A long engine never signals another entry.
    #[test]
    fn no_entry_while_long(
        highs in prop::collection::vec(arb_price(), 20..40),
        close in arb_price(),
    ) {
        let stop = StopState::resume(100.0, 120.0, 96.0);
        let mut engine =
            BreakoutStopEngine::resume(EngineConfig::default(), 20, stop).unwrap();
        prop_assert_eq!(engine.evaluate_entry(close, &highs).unwrap(), None);
    }
}

// ── 4. Ratchet Monotonicity ──────────────────────────────────────────

proptest! {
    /// Holds whether or not the host reports a resting stop on each call.
    #[test]
    fn stop_only_tightens(
        breakout in arb_price(),
        closes in prop::collection::vec((arb_price(), any::<bool>()), 1..60),
    ) {
        let mut engine = BreakoutStopEngine::new(EngineConfig::default()).unwrap();
        let highs = vec![breakout; 20];
        prop_assert!(engine.evaluate_entry(breakout, &highs).unwrap().is_some());

        engine.manage_stop(breakout, false, 100.0).unwrap();
        let mut last_stop = engine.stop_state().unwrap().current_stop_price().unwrap();
        let mut last_high = engine.stop_state().unwrap().highest_price_seen();

        for (close, has_open_stop) in closes {
            let intents = engine.manage_stop(close, has_open_stop, 100.0).unwrap();
            let max_intents = if has_open_stop { 1 } else { 2 };
            prop_assert!(intents.len() <= max_intents);

            let state = *engine.stop_state().unwrap();
            let stop = state.current_stop_price().unwrap();
            prop_assert!(stop >= last_stop);
            prop_assert!(state.highest_price_seen() >= last_high);
            prop_assert!(stop <= state.highest_price_seen());
            last_stop = stop;
            last_high = state.highest_price_seen();
        }
    }

    /// Calling manage_stop twice with the same inputs moves nothing the second
    /// time. Without a resting order the second call only re-places the stop
    /// at its current level.
    #[test]
    fn manage_stop_idempotent(
        highest in arb_price(),
        close in arb_price(),
        has_open_stop in any::<bool>(),
    ) {
        let stop = StopState::resume(highest * 0.9, highest, highest * 0.8);
        let mut engine =
            BreakoutStopEngine::resume(EngineConfig::default(), 20, stop).unwrap();

        engine.manage_stop(close, has_open_stop, 100.0).unwrap();
        let after_first = *engine.stop_state().unwrap();
        let second = engine.manage_stop(close, has_open_stop, 100.0).unwrap();
        prop_assert_eq!(*engine.stop_state().unwrap(), after_first);

        if has_open_stop {
            prop_assert!(second.is_empty());
        } else {
            let expected = vec![Intent::PlaceStopOrder {
                quantity: 100.0,
                trigger_price: after_first.current_stop_price().unwrap(),
            }];
            prop_assert_eq!(second, expected);
        }
    }
}
