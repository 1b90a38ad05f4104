//! Descriptive statistics over sample columns
//!
//! Quantiles use linear interpolation between the closest ranks, the same
//! convention as `numpy.percentile`, so fitted scalers agree with the
//! centring and spread most analysts expect from a robust scaler.

use crate::{MathError, Result};
use statrs::statistics::Statistics;

/// Quantile `q` (in `[0, 1]`) of the samples using linear interpolation
pub fn quantile(values: &[f64], q: f64) -> Result<f64> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot compute a quantile of an empty sample".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&q) {
        return Err(MathError::InvalidInput(format!(
            "Quantile must be within [0, 1], got {}",
            q
        )));
    }
    if values.iter().any(|v| v.is_nan()) {
        return Err(MathError::InvalidInput(
            "Sample contains NaN values".to_string(),
        ));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = q * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;

    Ok(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Median of the samples
pub fn median(values: &[f64]) -> Result<f64> {
    quantile(values, 0.5)
}

/// Interquartile range (`q75 - q25`) of the samples
pub fn interquartile_range(values: &[f64]) -> Result<f64> {
    Ok(quantile(values, 0.75)? - quantile(values, 0.25)?)
}

/// Mean and population standard deviation of the samples
pub fn mean_and_std(values: &[f64]) -> Result<(f64, f64)> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot compute moments of an empty sample".to_string(),
        ));
    }

    let mean = values.iter().mean();
    let std_dev = values.iter().population_std_dev();
    Ok((mean, std_dev))
}
