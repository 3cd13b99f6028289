//! Percentile, mode and rounding primitives
//!
//! All functions are pure. Empty input yields `None` rather than a default
//! value so callers can tell "no data" from zero.

use std::collections::HashMap;

/// Tolerance for binary floating-point noise when quantizing (0.3 * 10 is
/// 3.0000000000000004, which must still quantize to 0.3).
const QUANTIZE_EPSILON: f64 = 1e-9;

/// p-th percentile with linear interpolation between closest ranks.
///
/// rank = p/100 * (n - 1); the result interpolates between the values at
/// floor(rank) and ceil(rank) of the sorted input.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Most frequent value by exact equality.
///
/// Ties go to the value whose first occurrence comes earliest in the input.
/// Only meaningful on values that were already quantized.
pub fn mode(values: &[f64]) -> Option<f64> {
    // bits -> (count, first index)
    let mut counts: HashMap<u64, (usize, usize)> = HashMap::new();
    for (idx, value) in values.iter().enumerate() {
        // + 0.0 folds -0.0 into 0.0
        let entry = counts.entry((value + 0.0).to_bits()).or_insert((0, idx));
        entry.0 += 1;
    }

    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(bits, _)| f64::from_bits(bits))
}

pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().max_by(|a, b| a.total_cmp(b))
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Round to `decimals` places, halves rounding up
pub fn round_half_up(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor + 0.5 + QUANTIZE_EPSILON).floor() / factor
}

/// Round up to `decimals` places
pub fn ceil_to_decimals(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    ceil_scaled(value * factor) / factor
}

/// Round up to the nearest multiple of `step`
pub fn ceil_to_multiple(value: f64, step: f64) -> f64 {
    ceil_scaled(value / step) * step
}

fn ceil_scaled(scaled: f64) -> f64 {
    let nearest = scaled.round();
    if (scaled - nearest).abs() <= QUANTIZE_EPSILON * nearest.abs().max(1.0) {
        nearest
    } else {
        scaled.ceil()
    }
}

/// Largest positive increase between consecutive values, 0 if none
pub fn largest_spike(values: &[f64]) -> f64 {
    values
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold(0.0, f64::max)
}
