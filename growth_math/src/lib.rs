//! # Growth Math
//!
//! Numeric building blocks for the growth forecasting pipeline.
//! This crate provides the column scalers used to normalise feature and
//! target matrices, trailing window statistics used for feature engineering
//! and the error metrics reported by model training.

use thiserror::Error;

pub mod metrics;
pub mod moving_averages;
pub mod scaling;
pub mod statistics;

pub use scaling::{RobustScaler, ScalingPipeline, StandardScaler};

/// Errors that can occur in numeric calculations
#[derive(Error, Debug)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Shape mismatch: expected {expected} columns, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
}

/// Result type for growth math operations
pub type Result<T> = std::result::Result<T, MathError>;
