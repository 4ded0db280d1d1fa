//! Small numeric helpers shared by the aggregators.

/// Arithmetic mean of integer samples. Summing in `i64` keeps the result
/// independent of input order.
pub fn mean_i64(values: &[i64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<i64>() as f64 / values.len() as f64
    }
}

/// Percentile by linear interpolation between order statistics: for `n`
/// sorted samples the rank is `p * (n - 1)` and the value is interpolated
/// between the two neighbouring samples. `sorted` must be ascending.
pub fn percentile(sorted: &[i64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0] as f64,
        n => {
            let rank = p.clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let weight = rank - lower as f64;
            let low = sorted[lower] as f64;
            let high = sorted[upper] as f64;
            low + (high - low) * weight
        }
    }
}

pub fn round2(value: f64) -> f64 {
    if value.is_finite() {
        (value * 100.0).round() / 100.0
    } else {
        0.0
    }
}
