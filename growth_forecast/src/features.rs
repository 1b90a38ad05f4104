//! Supervised feature tables built from count series
//!
//! Each calendar key becomes one row holding its timestamp, `lag` shifted
//! copies of the count and the mean of the counts preceding it. Rows whose
//! lag or rolling values are undefined are dropped, so the table starts
//! `max(lag, rolling_mean)` periods after the series.

use crate::data::CountSeries;
use crate::error::{ForecastError, Result};
use crate::horizon::HyperparamConfig;
use growth_math::moving_averages::preceding_means;
use ndarray::{Array1, Array2};
use polars::prelude::*;

/// Name of the timestamp column
pub const TIMESTAMP: &str = "timestamp";
/// Name of the rolling mean column
pub const ROLLING_MEAN: &str = "rolling_mean";
/// Name of the target column
pub const TARGET: &str = "target";

/// Name of the `i`-th lag column, starting at 1
pub fn lag_column(i: usize) -> String {
    format!("lag_{}", i)
}

/// Feature rows ordered by strictly increasing timestamp
#[derive(Debug, Clone)]
pub struct FeatureTable {
    df: DataFrame,
    lag: usize,
}

impl FeatureTable {
    /// Underlying data frame
    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    /// Number of rows
    pub fn height(&self) -> usize {
        self.df.height()
    }

    /// Number of lag columns
    pub fn lag(&self) -> usize {
        self.lag
    }

    /// Feature column names in matrix order
    pub fn feature_columns(&self) -> Vec<String> {
        std::iter::once(TIMESTAMP.to_string())
            .chain((1..=self.lag).map(lag_column))
            .chain(std::iter::once(ROLLING_MEAN.to_string()))
            .collect()
    }

    /// Row timestamps in seconds
    pub fn timestamps(&self) -> Result<Vec<i64>> {
        Ok(self.df.column(TIMESTAMP)?.i64()?.into_iter().flatten().collect())
    }

    /// Values of one float column
    pub fn column_values(&self, name: &str) -> Result<Vec<f64>> {
        Ok(self.df.column(name)?.f64()?.into_iter().flatten().collect())
    }

    /// Feature matrix `[timestamp, lag_1..lag_k, rolling_mean]`
    pub fn features(&self) -> Result<Array2<f64>> {
        let columns = self.feature_columns();
        let mut matrix = Array2::zeros((self.height(), columns.len()));

        for (i, ts) in self.timestamps()?.into_iter().enumerate() {
            matrix[[i, 0]] = ts as f64;
        }
        for (j, name) in columns.iter().enumerate().skip(1) {
            for (i, value) in self.column_values(name)?.into_iter().enumerate() {
                matrix[[i, j]] = value;
            }
        }
        Ok(matrix)
    }

    /// Target vector
    pub fn target(&self) -> Result<Array1<f64>> {
        Ok(Array1::from_vec(self.column_values(TARGET)?))
    }
}

/// Builds [`FeatureTable`]s from count series
#[derive(Debug, Clone, Copy)]
pub struct FeatureEngineer {
    config: HyperparamConfig,
}

impl FeatureEngineer {
    /// Create an engineer for the lag and rolling window of `config`
    pub fn new(config: HyperparamConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Hyperparameters in use
    pub fn config(&self) -> HyperparamConfig {
        self.config
    }

    /// Turn a count series into a feature table
    pub fn build(&self, series: &CountSeries) -> Result<FeatureTable> {
        if series.is_empty() {
            return Err(ForecastError::DataUnavailable(
                "Cannot build features from an empty series".to_string(),
            ));
        }

        let timestamps: Vec<i64> = series.keys().iter().map(|k| k.timestamp()).collect();
        let targets: Vec<f64> = series.values().into_iter().map(|v| v as f64).collect();
        let rolling = preceding_means(&targets, self.config.rolling_mean)?;

        let target = Series::new(TARGET, targets);
        let mut columns = vec![Series::new(TIMESTAMP, timestamps)];
        for i in 1..=self.config.lag {
            let mut shifted = target.shift(i as i64);
            shifted.rename(&lag_column(i));
            columns.push(shifted);
        }
        columns.push(Series::new(ROLLING_MEAN, rolling));
        columns.push(target);

        let df = DataFrame::new(columns)?.drop_nulls::<String>(None)?;
        if df.height() == 0 {
            return Err(ForecastError::InsufficientHistory(format!(
                "{} periods leave no rows after lag {} and rolling mean {}",
                series.len(),
                self.config.lag,
                self.config.rolling_mean
            )));
        }

        tracing::trace!(rows = df.height(), lag = self.config.lag, "Built feature table");
        Ok(FeatureTable {
            df,
            lag: self.config.lag,
        })
    }
}
