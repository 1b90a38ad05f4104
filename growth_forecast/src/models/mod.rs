//! Sequence regression models

use crate::error::Result;
use ndarray::{Array1, ArrayView3};

pub mod lstm;

pub use lstm::{FitOptions, FitReport, LstmConfig, LstmRegressor};

/// A model mapping `(samples, steps, features)` windows to one value each
pub trait SequenceModel: Send + Sync {
    /// Features expected per time step
    fn input_size(&self) -> usize;

    /// Predict one value per window; never random
    fn predict(&self, windows: ArrayView3<f64>) -> Result<Array1<f64>>;
}
