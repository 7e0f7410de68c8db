//! Dispersion helpers over small sets of income estimates.
//!
//! Variance here is the population variance (divide by n): the three methods are
//! the whole population being compared, not a sample of some larger set.

/// Compute the mean of a data slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Population variance: mean of squared deviations.
pub fn population_variance(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let m = mean(data);
    data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / data.len() as f64
}

pub fn population_std_dev(data: &[f64]) -> f64 {
    population_variance(data).sqrt()
}

/// Largest `|x - mean| / mean` over the slice.
/// Returns infinity when the mean is not positive, which classifies as the loosest agreement.
pub fn max_relative_deviation(data: &[f64]) -> f64 {
    let m = mean(data);
    if m <= 0.0 || !m.is_finite() {
        return f64::INFINITY;
    }
    data.iter()
        .map(|x| (x - m).abs() / m)
        .fold(0.0, f64::max)
}

/// Relative gap between two values: `|a - b| / max(a, b)`.
/// `None` when neither value is positive.
pub fn relative_gap(a: f64, b: f64) -> Option<f64> {
    let denom = a.max(b);
    if denom <= 0.0 || !denom.is_finite() {
        return None;
    }
    Some((a - b).abs() / denom)
}

/// Round to a fixed number of decimals for display and serialization.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
