//! Chronological train/test split and normalisation
//!
//! Scalers are fitted on the training partition only and then applied to
//! the test partition, so no statistic of the test rows leaks into training.

use crate::error::{ForecastError, Result};
use crate::features::FeatureTable;
use growth_math::ScalingPipeline;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

/// Default share of rows held out for validation
pub const DEFAULT_TEST_FRACTION: f64 = 0.3;

/// Normalised partitions and the scalers that produced them
#[derive(Debug, Clone)]
pub struct SplitData {
    /// Normalised training features
    pub x_train: Array2<f64>,
    /// Normalised test features
    pub x_test: Array2<f64>,
    /// Normalised training targets
    pub y_train: Array1<f64>,
    /// Normalised test targets
    pub y_test: Array1<f64>,
    /// Feature scaler fitted on `x_train`
    pub scaler_x: ScalingPipeline,
    /// Target scaler fitted on `y_train`
    pub scaler_y: ScalingPipeline,
}

/// Scale a target vector with a single-column pipeline
pub fn transform_target(scaler: &ScalingPipeline, y: ArrayView1<f64>) -> Result<Array1<f64>> {
    let scaled = scaler.transform(y.insert_axis(Axis(1)))?;
    Ok(scaled.column(0).to_owned())
}

/// Map scaled targets back to counts
pub fn inverse_transform_target(
    scaler: &ScalingPipeline,
    y: ArrayView1<f64>,
) -> Result<Array1<f64>> {
    let restored = scaler.inverse_transform(y.insert_axis(Axis(1)))?;
    Ok(restored.column(0).to_owned())
}

/// Splits feature tables chronologically and normalises both partitions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Splitter {
    test_fraction: f64,
}

impl Default for Splitter {
    fn default() -> Self {
        Self {
            test_fraction: DEFAULT_TEST_FRACTION,
        }
    }
}

impl Splitter {
    /// Create a splitter holding out `test_fraction` of the rows
    pub fn new(test_fraction: f64) -> Result<Self> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "Test fraction must be in (0, 1), got {}",
                test_fraction
            )));
        }
        Ok(Self { test_fraction })
    }

    /// Held-out share
    pub fn test_fraction(&self) -> f64 {
        self.test_fraction
    }

    /// Row counts of the `(train, test)` partitions for `n` rows
    pub fn partition_sizes(&self, n: usize) -> (usize, usize) {
        let n_test = ((n as f64) * self.test_fraction).ceil() as usize;
        let n_test = n_test.min(n);
        (n - n_test, n_test)
    }

    /// Split and normalise a feature table
    pub fn split(&self, table: &FeatureTable) -> Result<SplitData> {
        self.split_arrays(table.features()?.view(), table.target()?.view())
    }

    /// Split and normalise raw feature rows and targets
    pub fn split_arrays(&self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<SplitData> {
        if x.nrows() != y.len() {
            return Err(ForecastError::InvalidParameter(format!(
                "{} feature rows for {} targets",
                x.nrows(),
                y.len()
            )));
        }

        let (n_train, n_test) = self.partition_sizes(x.nrows());
        if n_train == 0 || n_test == 0 {
            return Err(ForecastError::InsufficientData(format!(
                "{} rows split into {} train and {} test rows",
                x.nrows(),
                n_train,
                n_test
            )));
        }

        let (x_train_raw, x_test_raw) = x.split_at(Axis(0), n_train);
        let (y_train_raw, y_test_raw) = y.split_at(Axis(0), n_train);

        let (scaler_x, x_train) = ScalingPipeline::fit_transform(x_train_raw)?;
        let x_test = scaler_x.transform(x_test_raw)?;

        let (scaler_y, y_train) = ScalingPipeline::fit_transform(y_train_raw.insert_axis(Axis(1)))?;
        let y_test = transform_target(&scaler_y, y_test_raw)?;

        Ok(SplitData {
            x_train,
            x_test,
            y_train: y_train.column(0).to_owned(),
            y_test,
            scaler_x,
            scaler_y,
        })
    }
}
