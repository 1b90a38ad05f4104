//! Error types for the growth_forecast crate

use growth_math::MathError;
use polars::prelude::PolarsError;
use thiserror::Error;

/// Custom error types for the growth_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// The descriptive source returned nothing
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// Feature engineering left no usable rows
    #[error("Insufficient history: {0}")]
    InsufficientHistory(String),

    /// A train/test partition or the training windows are empty
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Sequence length is zero or longer than the data
    #[error("Invalid window: sequence length {sequence_length} for {rows} rows")]
    InvalidWindow { sequence_length: usize, rows: usize },

    /// No registry run matches a lookup
    #[error("No run found: {0}")]
    NoRunFound(String),

    /// The model artifact of a run is missing or unreadable
    #[error("Model not loaded: {0}")]
    ModelNotLoaded(String),

    /// A scaler artifact of a run is missing or unreadable
    #[error("Scaler not loaded: {0}")]
    ScalerNotLoaded(String),

    /// Any failure while serving a prediction
    #[error("Prediction failed: {source}")]
    PredictionFailed {
        #[source]
        source: Box<ForecastError>,
    },

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Registry storage failure
    #[error("Registry error: {0}")]
    Registry(String),

    /// Model training failure
    #[error("Training error: {0}")]
    Training(String),

    /// Error from mathematical operations
    #[error("Math error: {0}")]
    Math(#[from] MathError),

    /// Error from IO operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from JSON (de)serialization
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Error from CSV parsing
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    Polars(String),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::Polars(err.to_string())
    }
}

impl ForecastError {
    /// Wrap an error raised while serving a prediction
    pub fn prediction_failed(source: ForecastError) -> Self {
        match source {
            already @ ForecastError::PredictionFailed { .. } => already,
            other => ForecastError::PredictionFailed {
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, looking through `PredictionFailed`
    pub fn root_cause(&self) -> &ForecastError {
        match self {
            ForecastError::PredictionFailed { source } => source.root_cause(),
            other => other,
        }
    }

    /// HTTP status an API layer should answer with for this error
    pub fn http_status(&self) -> u16 {
        match self.root_cause() {
            ForecastError::DataUnavailable(_) | ForecastError::NoRunFound(_) => 404,
            ForecastError::ModelNotLoaded(_) | ForecastError::ScalerNotLoaded(_) => 501,
            ForecastError::InsufficientHistory(_)
            | ForecastError::InsufficientData(_)
            | ForecastError::InvalidWindow { .. }
            | ForecastError::InvalidParameter(_) => 400,
            _ => 500,
        }
    }
}
