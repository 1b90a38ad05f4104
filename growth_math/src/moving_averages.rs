//! Moving average calculations
//!
//! Contains the streaming Simple Moving Average (SMA) and the trailing
//! window helpers built on it for feature engineering.

use crate::{MathError, Result};
use std::collections::VecDeque;

/// Simple Moving Average (SMA) implementation
#[derive(Debug, Clone)]
pub struct SimpleMovingAverage {
    period: usize,
    values: VecDeque<f64>,
    sum: f64,
}

impl SimpleMovingAverage {
    /// Create a new Simple Moving Average with the specified period
    pub fn new(period: usize) -> Result<Self> {
        if period == 0 {
            return Err(MathError::InvalidInput(
                "Period must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            period,
            values: VecDeque::with_capacity(period + 1),
            sum: 0.0,
        })
    }

    /// Update the SMA with a new value
    pub fn update(&mut self, value: f64) {
        self.values.push_back(value);
        self.sum += value;

        if self.values.len() > self.period {
            if let Some(old_value) = self.values.pop_front() {
                self.sum -= old_value;
            }
        }
    }

    /// Current SMA value, `None` until `period` values have been seen
    pub fn value(&self) -> Option<f64> {
        if self.values.len() < self.period {
            None
        } else {
            Some(self.sum / self.period as f64)
        }
    }

    /// Get the current period
    pub fn period(&self) -> usize {
        self.period
    }

    /// Reset the SMA, clearing all values
    pub fn reset(&mut self) {
        self.values.clear();
        self.sum = 0.0;
    }
}

/// Mean of the `window` values strictly before each position.
///
/// Position `i` holds the mean of `values[i - window..i]`, or `None` while
/// fewer than `window` earlier values exist. The value at `i` itself never
/// contributes to its own entry.
pub fn preceding_means(values: &[f64], window: usize) -> Result<Vec<Option<f64>>> {
    let mut sma = SimpleMovingAverage::new(window)?;
    let mut means = Vec::with_capacity(values.len());

    for &value in values {
        means.push(sma.value());
        sma.update(value);
    }

    Ok(means)
}
