//! # Growth Forecast
//!
//! LSTM forecasting of customer and order growth over e-commerce event logs.
//!
//! ## Features
//!
//! - Count series by day, month or year from signup and order event logs
//! - Lag and rolling-mean feature engineering on polars data frames
//! - Chronological train/test split with robust + standard scaling
//! - Single-layer LSTM regressor with dropout, L2 and Adam
//! - Hyperparameter grid search with a filesystem model registry
//! - Concurrent training cycles on a daily schedule
//! - Calendar-labelled forecasts for four fixed horizons
//!
//! ## Horizons
//!
//! | Horizon | Granularity | Values | lag / rolling_mean / sequence_length |
//! |---------|-------------|--------|--------------------------------------|
//! | `one_day` | day | tomorrow | 2 / 3 / 5 |
//! | `seven_days` | day | the next 7 days | 3 / 7 / 7 |
//! | `month` | month | the current month | 2 / 3 / 2 |
//! | `year` | year | the current year | 1 / 2 / 1 |
//!
//! ## Quick Start
//!
//! ```no_run
//! use growth_forecast::{
//!     DataPredictor, Domain, ForecastConfig, Horizon, ModelOptimizer, ModelRegistry,
//! };
//!
//! # async fn run() -> growth_forecast::Result<()> {
//! let config = ForecastConfig::from_file("growth.json")?;
//! let sources = config.sources.load()?;
//! let registry = ModelRegistry::open(config.registry.clone())?;
//!
//! // Train every domain and horizon, then prune superseded runs
//! let optimizer = ModelOptimizer::from_config(&config, sources.clone(), registry.clone())?;
//! optimizer.run_cycle().await;
//!
//! // Forecast the next seven days of orders
//! let predictor = DataPredictor::new(sources, registry, config.hyperparams.clone());
//! let forecast = predictor.predict(Domain::OrdersGrowth, Horizon::SevenDays)?;
//! println!("{}", forecast.to_json());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod horizon;
pub mod models;
pub mod optimizer;
pub mod predictor;
pub mod registry;
pub mod sequence;
pub mod source;
pub mod split;
pub mod training;

// Re-export commonly used types
pub use crate::config::ForecastConfig;
pub use crate::data::{CalendarKey, CountSeries, Granularity, GrowthSeries, SeriesRange};
pub use crate::error::{ForecastError, Result};
pub use crate::features::{FeatureEngineer, FeatureTable};
pub use crate::horizon::{Domain, ForecastLabel, Horizon, HyperparamConfig, HyperparamTable};
pub use crate::models::{LstmRegressor, SequenceModel};
pub use crate::optimizer::{CycleReport, ModelOptimizer};
pub use crate::predictor::{DataPredictor, ForecastResult};
pub use crate::registry::{ModelRegistry, ModelRun, RegistryConfig, RunId};
pub use crate::source::{CountSource, EventLogSource, SourceSet};
pub use crate::split::Splitter;
pub use crate::training::{HyperparameterSearch, TrainingGrid, TrainingJob};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
