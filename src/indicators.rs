//! Price statistics used by the breakout rules
//!
//! Standard deviation comes from `statrs`; everything here works on plain
//! oldest-first `f64` slices so the engine stays independent of the `Candle` type.

use statrs::statistics::Statistics;

/// Population standard deviation (ddof = 0). `None` for an empty slice.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().population_std_dev())
}

/// Highest value in the slice. `None` for an empty slice.
pub fn highest(values: &[f64]) -> Option<f64> {
    values
        .iter()
        .copied()
        .fold(None, |max, v| Some(max.map_or(v, |m: f64| m.max(v))))
}

/// Highest value excluding the most recent element, i.e. the breakout threshold
/// of a window whose last entry is the latest completed bar.
pub fn prior_high(values: &[f64]) -> Option<f64> {
    match values.split_last() {
        Some((_, prior)) => highest(prior),
        None => None,
    }
}
