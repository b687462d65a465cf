//! Missing-aware aggregates over telemetry columns.
//!
//! Missing samples are absent from both numerator and denominator.

/// Mean of the present samples, `None` when there are none
pub fn mean(samples: &[Option<f64>]) -> Option<f64> {
    let (sum, count) = samples
        .iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Number of present samples
pub fn count_present(samples: &[Option<f64>]) -> usize {
    samples.iter().flatten().count()
}

/// Number of present samples matching `predicate`
pub fn count_where<F>(samples: &[Option<f64>], predicate: F) -> usize
where
    F: Fn(f64) -> bool,
{
    samples.iter().flatten().filter(|&&v| predicate(v)).count()
}

/// Whether any present sample equals `value` exactly
pub fn contains(samples: &[Option<f64>], value: f64) -> bool {
    samples.iter().flatten().any(|&v| v == value)
}

/// Round half away from zero to `decimals` places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}
