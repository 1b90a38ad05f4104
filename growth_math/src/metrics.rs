//! Error metrics for evaluating predictions against observed values

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

fn check_lengths(predicted: &[f64], actual: &[f64]) -> Result<()> {
    if predicted.len() != actual.len() {
        return Err(MathError::InvalidInput(format!(
            "Prediction length ({}) doesn't match actual length ({})",
            predicted.len(),
            actual.len()
        )));
    }
    Ok(())
}

/// Mean squared error; NaN for empty input
pub fn mean_squared_error(predicted: &[f64], actual: &[f64]) -> Result<f64> {
    check_lengths(predicted, actual)?;
    if predicted.is_empty() {
        return Ok(f64::NAN);
    }

    let sum: f64 = predicted
        .iter()
        .zip(actual.iter())
        .map(|(p, a)| (p - a).powi(2))
        .sum();
    Ok(sum / predicted.len() as f64)
}

/// Mean absolute error; NaN for empty input
pub fn mean_absolute_error(predicted: &[f64], actual: &[f64]) -> Result<f64> {
    check_lengths(predicted, actual)?;
    if predicted.is_empty() {
        return Ok(f64::NAN);
    }

    let sum: f64 = predicted
        .iter()
        .zip(actual.iter())
        .map(|(p, a)| (p - a).abs())
        .sum();
    Ok(sum / predicted.len() as f64)
}

/// MSE and MAE of one evaluation pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorMetrics {
    /// Mean Squared Error
    pub mse: f64,
    /// Mean Absolute Error
    pub mae: f64,
}

impl ErrorMetrics {
    /// Evaluate `predicted` against `actual`
    pub fn evaluate(predicted: &[f64], actual: &[f64]) -> Result<Self> {
        Ok(Self {
            mse: mean_squared_error(predicted, actual)?,
            mae: mean_absolute_error(predicted, actual)?,
        })
    }
}

impl std::fmt::Display for ErrorMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MSE: {:.6}, MAE: {:.6}", self.mse, self.mae)
    }
}
