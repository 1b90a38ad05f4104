//! Column-wise scaling transforms
//!
//! Contains the fitted scalers applied to feature and target matrices:
//! - Robust scaler (median centring, interquartile-range scaling)
//! - Standard scaler (zero mean, unit population variance)
//! - Scaling pipeline chaining the two
//!
//! Every scaler is created by `fit` and cannot be refitted afterwards; a new
//! scaler has to be fitted on new data. Columns with zero spread are scaled
//! by one so constant columns map to zero instead of NaN.

use crate::statistics::{interquartile_range, mean_and_std, median};
use crate::{MathError, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Replace a degenerate spread by one
fn guard_scale(scale: f64) -> f64 {
    if scale.abs() < f64::EPSILON || !scale.is_finite() {
        1.0
    } else {
        scale
    }
}

fn column_values(data: &ArrayView2<f64>, column: usize) -> Vec<f64> {
    data.column(column).iter().copied().collect()
}

fn check_fit_input(data: &ArrayView2<f64>) -> Result<()> {
    if data.nrows() == 0 || data.ncols() == 0 {
        return Err(MathError::InsufficientData(
            "Cannot fit a scaler on an empty matrix".to_string(),
        ));
    }
    if data.iter().any(|v| !v.is_finite()) {
        return Err(MathError::InvalidInput(
            "Cannot fit a scaler on non-finite values".to_string(),
        ));
    }
    Ok(())
}

/// Shift and divide every column by the given per-column parameters
fn apply(data: &ArrayView2<f64>, center: &Array1<f64>, scale: &Array1<f64>) -> Result<Array2<f64>> {
    if data.ncols() != center.len() {
        return Err(MathError::ShapeMismatch {
            expected: center.len(),
            actual: data.ncols(),
        });
    }

    let mut out = data.to_owned();
    for (mut column, (c, s)) in out
        .axis_iter_mut(Axis(1))
        .zip(center.iter().zip(scale.iter()))
    {
        column.mapv_inplace(|v| (v - c) / s);
    }
    Ok(out)
}

/// Undo `apply` for the given per-column parameters
fn unapply(data: &ArrayView2<f64>, center: &Array1<f64>, scale: &Array1<f64>) -> Result<Array2<f64>> {
    if data.ncols() != center.len() {
        return Err(MathError::ShapeMismatch {
            expected: center.len(),
            actual: data.ncols(),
        });
    }

    let mut out = data.to_owned();
    for (mut column, (c, s)) in out
        .axis_iter_mut(Axis(1))
        .zip(center.iter().zip(scale.iter()))
    {
        column.mapv_inplace(|v| v * s + c);
    }
    Ok(out)
}

/// Robust scaler: subtracts the column median and divides by the column IQR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustScaler {
    center: Array1<f64>,
    scale: Array1<f64>,
}

impl RobustScaler {
    /// Fit the scaler on the rows of `data`
    pub fn fit(data: ArrayView2<f64>) -> Result<Self> {
        check_fit_input(&data)?;

        let mut center = Array1::zeros(data.ncols());
        let mut scale = Array1::ones(data.ncols());
        for column in 0..data.ncols() {
            let values = column_values(&data, column);
            center[column] = median(&values)?;
            scale[column] = guard_scale(interquartile_range(&values)?);
        }

        Ok(Self { center, scale })
    }

    /// Apply the fitted transform
    pub fn transform(&self, data: ArrayView2<f64>) -> Result<Array2<f64>> {
        apply(&data, &self.center, &self.scale)
    }

    /// Reverse the fitted transform
    pub fn inverse_transform(&self, data: ArrayView2<f64>) -> Result<Array2<f64>> {
        unapply(&data, &self.center, &self.scale)
    }

    /// Per-column medians
    pub fn center(&self) -> ArrayView1<f64> {
        self.center.view()
    }

    /// Per-column interquartile ranges
    pub fn scale(&self) -> ArrayView1<f64> {
        self.scale.view()
    }
}

/// Standard scaler: subtracts the column mean and divides by the column
/// population standard deviation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Array1<f64>,
    std_dev: Array1<f64>,
}

impl StandardScaler {
    /// Fit the scaler on the rows of `data`
    pub fn fit(data: ArrayView2<f64>) -> Result<Self> {
        check_fit_input(&data)?;

        let mut mean = Array1::zeros(data.ncols());
        let mut std_dev = Array1::ones(data.ncols());
        for column in 0..data.ncols() {
            let (m, s) = mean_and_std(&column_values(&data, column))?;
            mean[column] = m;
            std_dev[column] = guard_scale(s);
        }

        Ok(Self { mean, std_dev })
    }

    /// Apply the fitted transform
    pub fn transform(&self, data: ArrayView2<f64>) -> Result<Array2<f64>> {
        apply(&data, &self.mean, &self.std_dev)
    }

    /// Reverse the fitted transform
    pub fn inverse_transform(&self, data: ArrayView2<f64>) -> Result<Array2<f64>> {
        unapply(&data, &self.mean, &self.std_dev)
    }

    /// Per-column means
    pub fn mean(&self) -> ArrayView1<f64> {
        self.mean.view()
    }

    /// Per-column standard deviations
    pub fn std_dev(&self) -> ArrayView1<f64> {
        self.std_dev.view()
    }
}

/// Robust scaling followed by standardisation
///
/// # Examples
///
/// ```
/// use growth_math::ScalingPipeline;
/// use ndarray::array;
///
/// let train = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]];
/// let pipeline = ScalingPipeline::fit(train.view()).unwrap();
///
/// let scaled = pipeline.transform(train.view()).unwrap();
/// let restored = pipeline.inverse_transform(scaled.view()).unwrap();
/// assert!((restored[[3, 1]] - 40.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingPipeline {
    robust: RobustScaler,
    standard: StandardScaler,
}

impl ScalingPipeline {
    /// Fit both stages on `data`; the standard stage is fitted on the
    /// robust-scaled output
    pub fn fit(data: ArrayView2<f64>) -> Result<Self> {
        let robust = RobustScaler::fit(data)?;
        let centred = robust.transform(data)?;
        let standard = StandardScaler::fit(centred.view())?;
        Ok(Self { robust, standard })
    }

    /// Fit on `data` and return its transformed copy
    pub fn fit_transform(data: ArrayView2<f64>) -> Result<(Self, Array2<f64>)> {
        let pipeline = Self::fit(data)?;
        let transformed = pipeline.transform(data)?;
        Ok((pipeline, transformed))
    }

    /// Apply both stages in order
    pub fn transform(&self, data: ArrayView2<f64>) -> Result<Array2<f64>> {
        let centred = self.robust.transform(data)?;
        self.standard.transform(centred.view())
    }

    /// Reverse both stages in reverse order
    pub fn inverse_transform(&self, data: ArrayView2<f64>) -> Result<Array2<f64>> {
        let centred = self.standard.inverse_transform(data)?;
        self.robust.inverse_transform(centred.view())
    }

    /// Number of columns the pipeline was fitted on
    pub fn n_features(&self) -> usize {
        self.robust.center.len()
    }

    /// The robust stage
    pub fn robust(&self) -> &RobustScaler {
        &self.robust
    }

    /// The standard stage
    pub fn standard(&self) -> &StandardScaler {
        &self.standard
    }
}
