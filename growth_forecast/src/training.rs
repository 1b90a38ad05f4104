//! Grid search over LSTM hyperparameters and the end-to-end training job
//!
//! A [`TrainingJob`] fetches the zero-filled history of one domain at the
//! granularity of one horizon, engineers features, splits and normalises
//! them, cuts windows and runs a [`HyperparameterSearch`]. The grid point
//! with the lowest validation MSE is persisted to the registry.

use crate::data::SeriesRange;
use crate::error::{ForecastError, Result};
use crate::features::FeatureEngineer;
use crate::horizon::{Domain, Horizon, HyperparamConfig};
use crate::models::{FitOptions, LstmConfig, LstmRegressor};
use crate::registry::{ModelRegistry, RunArtifacts, RunId, RunMetrics, RunParams};
use crate::sequence::{Sequencer, Sequences};
use crate::source::CountSource;
use crate::split::Splitter;
use ndarray::{Array1, Array3, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Hyperparameter axes searched by Cartesian product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingGrid {
    pub num_units: Vec<usize>,
    pub dropout: Vec<f64>,
    pub learning_rate: Vec<f64>,
    pub epochs: Vec<usize>,
    pub l2_reg: Vec<f64>,
    /// Windows per gradient step
    pub batch_size: usize,
    /// Seed of weight initialisation, dropout and shuffling
    pub seed: u64,
}

impl Default for TrainingGrid {
    fn default() -> Self {
        Self {
            num_units: vec![120],
            dropout: vec![0.1],
            learning_rate: vec![1e-5],
            epochs: vec![100],
            l2_reg: vec![1e-4],
            batch_size: 32,
            seed: 42,
        }
    }
}

/// One combination of the grid axes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPoint {
    pub num_units: usize,
    pub dropout: f64,
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2_reg: f64,
}

impl TrainingGrid {
    /// Every axis must hold at least one value
    pub fn validate(&self) -> Result<()> {
        if self.num_units.is_empty()
            || self.dropout.is_empty()
            || self.learning_rate.is_empty()
            || self.epochs.is_empty()
            || self.l2_reg.is_empty()
        {
            return Err(ForecastError::InvalidParameter(
                "Every training grid axis needs at least one value".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ForecastError::InvalidParameter(
                "Batch size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of grid points
    pub fn len(&self) -> usize {
        self.num_units.len()
            * self.dropout.len()
            * self.learning_rate.len()
            * self.epochs.len()
            * self.l2_reg.len()
    }

    /// Check if the grid has no points
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cartesian product of the axes, last axis varying fastest
    pub fn points(&self) -> Vec<GridPoint> {
        let mut points = Vec::with_capacity(self.len());
        for &num_units in &self.num_units {
            for &dropout in &self.dropout {
                for &learning_rate in &self.learning_rate {
                    for &epochs in &self.epochs {
                        for &l2_reg in &self.l2_reg {
                            points.push(GridPoint {
                                num_units,
                                dropout,
                                learning_rate,
                                epochs,
                                l2_reg,
                            });
                        }
                    }
                }
            }
        }
        points
    }
}

/// Result of training one grid point
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    pub point: GridPoint,
    /// Epoch whose weights were kept
    pub epoch: usize,
    pub metrics: RunMetrics,
}

impl Trial {
    fn is_usable(&self) -> bool {
        let m = &self.metrics;
        [m.train_mse, m.val_mse, m.train_mae, m.val_mae]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Every trial plus the winning model, if any trial was usable
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub trials: Vec<Trial>,
    pub best: Option<(Trial, LstmRegressor)>,
}

/// Trains one model per grid point and keeps the lowest validation MSE
#[derive(Debug, Clone)]
pub struct HyperparameterSearch {
    grid: TrainingGrid,
}

impl HyperparameterSearch {
    /// Create a search over a validated grid
    pub fn new(grid: TrainingGrid) -> Result<Self> {
        grid.validate()?;
        Ok(Self { grid })
    }

    /// Grid being searched
    pub fn grid(&self) -> &TrainingGrid {
        &self.grid
    }

    /// Train every grid point on `train`, scoring on `val`
    pub fn run(&self, train: &Sequences, val: &Sequences) -> Result<SearchOutcome> {
        if train.is_empty() {
            return Err(ForecastError::InsufficientData(
                "No training windows".to_string(),
            ));
        }
        let (_, _, input_size) = train.windows.dim();

        let mut trials = Vec::with_capacity(self.grid.len());
        let mut best: Option<(Trial, LstmRegressor)> = None;

        for (index, point) in self.grid.points().into_iter().enumerate() {
            let mut rng = StdRng::seed_from_u64(self.grid.seed.wrapping_add(index as u64));
            let config = LstmConfig {
                input_size,
                hidden_size: point.num_units,
                dropout: point.dropout,
                learning_rate: point.learning_rate,
                l2_reg: point.l2_reg,
            };
            let mut model = LstmRegressor::new(config, &mut rng)?;
            let options = FitOptions {
                epochs: point.epochs,
                batch_size: self.grid.batch_size,
            };
            let report = model.fit(train, val, &options, &mut rng)?;

            let trial = Trial {
                point,
                epoch: report.best.epoch,
                metrics: RunMetrics {
                    train_mse: report.best.train.mse,
                    val_mse: report.best.val.mse,
                    train_mae: report.best.train.mae,
                    val_mae: report.best.val.mae,
                },
            };
            tracing::debug!(
                num_units = point.num_units,
                dropout = point.dropout,
                learning_rate = point.learning_rate,
                epoch = trial.epoch,
                val_mse = trial.metrics.val_mse,
                "Grid point trained"
            );

            if !trial.is_usable() {
                tracing::warn!(?point, "Grid point produced non-finite metrics");
            } else if best
                .as_ref()
                .map_or(true, |(current, _)| trial.metrics.val_mse < current.metrics.val_mse)
            {
                best = Some((trial.clone(), model));
            }
            trials.push(trial);
        }

        Ok(SearchOutcome { trials, best })
    }
}

/// Windows of `x`, or none when it has fewer rows than the sequence length
fn windows_or_empty(
    sequencer: &Sequencer,
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
) -> Result<Sequences> {
    let length = sequencer.sequence_length();
    if length > 0 && x.nrows() < length {
        return Ok(Sequences {
            windows: Array3::zeros((0, length, x.ncols())),
            targets: Array1::zeros(0),
        });
    }
    sequencer.windows(x, y)
}

/// Trains and registers the model of one (domain, horizon) pair
#[derive(Clone)]
pub struct TrainingJob {
    pub domain: Domain,
    pub horizon: Horizon,
    pub hyperparams: HyperparamConfig,
    pub source: Arc<dyn CountSource>,
    pub registry: ModelRegistry,
    pub search: HyperparameterSearch,
    pub splitter: Splitter,
}

impl std::fmt::Debug for TrainingJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainingJob")
            .field("domain", &self.domain)
            .field("horizon", &self.horizon)
            .field("hyperparams", &self.hyperparams)
            .finish_non_exhaustive()
    }
}

impl TrainingJob {
    /// Train and persist the best model; `None` when no grid point was usable
    pub fn run(&self) -> Result<Option<RunId>> {
        let hp = self.hyperparams;
        let span = tracing::info_span!("training", domain = %self.domain, horizon = %self.horizon);
        let _entered = span.enter();

        let series = self
            .source
            .fetch(SeriesRange::all(self.horizon.granularity()), true)?
            .into_series(self.domain.series());
        let table = FeatureEngineer::new(hp)?.build(&series)?;
        let split = self.splitter.split(&table)?;

        let sequencer = Sequencer::new(hp.sequence_length);
        let train = windows_or_empty(&sequencer, split.x_train.view(), split.y_train.view())?;
        let val = windows_or_empty(&sequencer, split.x_test.view(), split.y_test.view())?;
        tracing::info!(
            periods = series.len(),
            rows = table.height(),
            train_windows = train.len(),
            val_windows = val.len(),
            "Prepared training data"
        );

        let outcome = self.search.run(&train, &val)?;
        let Some((trial, model)) = outcome.best else {
            tracing::warn!(trials = outcome.trials.len(), "No usable model, nothing persisted");
            return Ok(None);
        };

        let params = RunParams {
            num_units: trial.point.num_units,
            dropout: trial.point.dropout,
            learning_rate: trial.point.learning_rate,
            epoch: trial.epoch,
            l2_reg: trial.point.l2_reg,
            lag: hp.lag,
            rolling_mean: hp.rolling_mean,
            sequence_length: hp.sequence_length,
        };
        let artifacts = RunArtifacts {
            model,
            scaler_x: split.scaler_x,
            scaler_y: split.scaler_y,
        };
        let run_id = self
            .registry
            .save(self.domain.run_name(), params, trial.metrics, &artifacts)?;

        tracing::info!(run_id = %run_id, val_mse = trial.metrics.val_mse, "Training finished");
        Ok(Some(run_id))
    }
}
