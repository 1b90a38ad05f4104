//! Sliding windows over normalised feature rows

use crate::error::{ForecastError, Result};
use ndarray::{s, Array1, Array3, ArrayView1, ArrayView2};

/// Model inputs `(samples, sequence_length, features)` and their targets
#[derive(Debug, Clone, PartialEq)]
pub struct Sequences {
    /// Input windows
    pub windows: Array3<f64>,
    /// Target following each window
    pub targets: Array1<f64>,
}

impl Sequences {
    /// Number of windows
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Check if there are no windows
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Cuts fixed-width windows, each paired with the next row's target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sequencer {
    sequence_length: usize,
}

impl Sequencer {
    /// Create a sequencer of `sequence_length` rows per window
    pub fn new(sequence_length: usize) -> Self {
        Self { sequence_length }
    }

    /// Rows per window
    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    fn check(&self, rows: usize) -> Result<()> {
        if self.sequence_length == 0 || self.sequence_length > rows {
            return Err(ForecastError::InvalidWindow {
                sequence_length: self.sequence_length,
                rows,
            });
        }
        Ok(())
    }

    /// Windows `x[i..i+L]` with targets `y[i+L]` for `i in 0..len - L`
    pub fn windows(&self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<Sequences> {
        if x.nrows() != y.len() {
            return Err(ForecastError::InvalidParameter(format!(
                "{} feature rows for {} targets",
                x.nrows(),
                y.len()
            )));
        }
        self.check(x.nrows())?;

        let length = self.sequence_length;
        let samples = x.nrows() - length;
        let mut windows = Array3::zeros((samples, length, x.ncols()));
        for i in 0..samples {
            windows
                .slice_mut(s![i, .., ..])
                .assign(&x.slice(s![i..i + length, ..]));
        }
        let targets = y.slice(s![length..]).to_owned();

        Ok(Sequences { windows, targets })
    }

    /// The last `count` windows ending at the final row, oldest first
    ///
    /// Used at inference time where no target follows the last window.
    pub fn trailing(&self, x: ArrayView2<f64>, count: usize) -> Result<Array3<f64>> {
        self.check(x.nrows())?;

        let length = self.sequence_length;
        let available = x.nrows() - length + 1;
        if count > available {
            return Err(ForecastError::InsufficientHistory(format!(
                "{} windows of {} rows requested from {} rows",
                count,
                length,
                x.nrows()
            )));
        }

        let first = available - count;
        let mut windows = Array3::zeros((count, length, x.ncols()));
        for (k, start) in (first..available).enumerate() {
            windows
                .slice_mut(s![k, .., ..])
                .assign(&x.slice(s![start..start + length, ..]));
        }
        Ok(windows)
    }
}
