//! Model registry: named training runs with parameters, metrics and artifacts
//!
//! Runs are grouped by experiment. Each run stores its metadata next to
//! three JSON artifacts: the model and the feature and target scalers.
//! Storage goes through the [`RunStore`] trait so the same registry logic
//! serves the filesystem backend and the in-memory one.

use crate::error::{ForecastError, Result};
use crate::horizon::{Domain, HyperparamConfig};
use crate::models::LstmRegressor;
use chrono::{DateTime, Utc};
use growth_math::ScalingPipeline;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

pub mod fs;
pub mod memory;

pub use self::fs::FileRunStore;
pub use self::memory::MemoryRunStore;

/// Default experiment name
pub const DEFAULT_EXPERIMENT: &str = "GrowthEx";
/// Metadata file of a run
pub const META_FILE: &str = "meta.json";
/// Model artifact name
pub const MODEL_ARTIFACT: &str = "model.json";
/// Feature scaler artifact name
pub const SCALER_X_ARTIFACT: &str = "scaler_X.json";
/// Target scaler artifact name
pub const SCALER_Y_ARTIFACT: &str = "scaler_y.json";

/// Where the registry lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Registry root; a `file://` prefix is accepted
    pub tracking_uri: String,
    /// Experiment grouping the runs
    pub experiment: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            tracking_uri: "./mlruns".to_string(),
            experiment: DEFAULT_EXPERIMENT.to_string(),
        }
    }
}

impl RegistryConfig {
    /// Filesystem root named by the tracking URI
    pub fn root_path(&self) -> PathBuf {
        PathBuf::from(
            self.tracking_uri
                .strip_prefix("file://")
                .unwrap_or(&self.tracking_uri),
        )
    }
}

/// Unique identifier of a run
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Wrap an existing identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh identifier derived from the start time plus random bits
    pub fn generate(start_time: DateTime<Utc>) -> Self {
        let suffix: u32 = rand::thread_rng().gen();
        Self(format!("{}-{:08x}", start_time.format("%Y%m%d%H%M%S%6f"), suffix))
    }

    /// Identifier as text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hyperparameters logged with a run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunParams {
    pub num_units: usize,
    pub dropout: f64,
    pub learning_rate: f64,
    /// Epoch whose weights were kept
    pub epoch: usize,
    pub l2_reg: f64,
    pub lag: usize,
    pub rolling_mean: usize,
    pub sequence_length: usize,
}

impl RunParams {
    /// Feature hyperparameters of the run
    pub fn hyperparams(&self) -> HyperparamConfig {
        HyperparamConfig {
            lag: self.lag,
            rolling_mean: self.rolling_mean,
            sequence_length: self.sequence_length,
        }
    }
}

/// Errors logged with a run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub train_mse: f64,
    pub val_mse: f64,
    pub train_mae: f64,
    pub val_mae: f64,
}

/// Metadata of a stored run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRun {
    pub run_id: RunId,
    /// Domain name the run was trained for
    pub run_name: String,
    pub experiment: String,
    pub start_time: DateTime<Utc>,
    pub params: RunParams,
    pub metrics: RunMetrics,
}

/// Model and scalers of a run
#[derive(Debug, Clone, PartialEq)]
pub struct RunArtifacts {
    pub model: LstmRegressor,
    pub scaler_x: ScalingPipeline,
    pub scaler_y: ScalingPipeline,
}

/// A (domain, hyperparameters) combination competing for the best run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunKey {
    pub domain: Domain,
    pub hyperparams: HyperparamConfig,
}

impl RunKey {
    /// Create a key
    pub fn new(domain: Domain, hyperparams: HyperparamConfig) -> Self {
        Self {
            domain,
            hyperparams,
        }
    }

    /// Exact match on run name and the three integer hyperparameters
    pub fn matches(&self, run: &ModelRun) -> bool {
        run.run_name == self.domain.run_name()
            && run.params.lag == self.hyperparams.lag
            && run.params.sequence_length == self.hyperparams.sequence_length
            && run.params.rolling_mean == self.hyperparams.rolling_mean
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (lag {}, rolling_mean {}, sequence_length {})",
            self.domain,
            self.hyperparams.lag,
            self.hyperparams.rolling_mean,
            self.hyperparams.sequence_length
        )
    }
}

/// One named file of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: &'static str,
    pub bytes: Vec<u8>,
}

/// Storage backend of a [`ModelRegistry`]
pub trait RunStore: Send + Sync {
    /// Publish a run with its artifacts; nothing is visible on failure
    fn create(&self, run: &ModelRun, artifacts: &[Artifact]) -> Result<()>;

    /// True once the experiment holds or has held a run
    fn has_experiment(&self, experiment: &str) -> Result<bool>;

    /// Metadata of every run of the experiment
    fn list(&self, experiment: &str) -> Result<Vec<ModelRun>>;

    /// Bytes of an artifact, `None` when missing
    fn read_artifact(&self, experiment: &str, run_id: &RunId, name: &str)
        -> Result<Option<Vec<u8>>>;

    /// Remove a run and its artifacts
    fn delete(&self, experiment: &str, run_id: &RunId) -> Result<()>;
}

/// Runs deleted and keys that failed during [`ModelRegistry::prune`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PruneReport {
    pub deleted: Vec<RunId>,
    pub failures: Vec<(RunKey, String)>,
}

fn by_training_error(a: &ModelRun, b: &ModelRun) -> Ordering {
    a.metrics
        .train_mse
        .total_cmp(&b.metrics.train_mse)
        .then(a.metrics.train_mae.total_cmp(&b.metrics.train_mae))
        .then(a.start_time.cmp(&b.start_time))
        .then_with(|| a.run_id.cmp(&b.run_id))
}

fn by_validation_error(a: &ModelRun, b: &ModelRun) -> Ordering {
    a.metrics
        .val_mse
        .total_cmp(&b.metrics.val_mse)
        .then(a.start_time.cmp(&b.start_time))
        .then_with(|| a.run_id.cmp(&b.run_id))
}

/// Client persisting and selecting training runs
#[derive(Clone)]
pub struct ModelRegistry {
    config: RegistryConfig,
    store: Arc<dyn RunStore>,
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ModelRegistry {
    /// Create a registry over an explicit backend
    pub fn new(config: RegistryConfig, store: Arc<dyn RunStore>) -> Self {
        Self { config, store }
    }

    /// Filesystem registry rooted at the tracking URI
    pub fn open(config: RegistryConfig) -> Result<Self> {
        let store = FileRunStore::open(config.root_path())?;
        Ok(Self::new(config, Arc::new(store)))
    }

    /// Registry kept in memory
    pub fn in_memory(experiment: &str) -> Self {
        let config = RegistryConfig {
            tracking_uri: "memory://".to_string(),
            experiment: experiment.to_string(),
        };
        Self::new(config, Arc::new(MemoryRunStore::default()))
    }

    /// Registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn experiment(&self) -> &str {
        &self.config.experiment
    }

    /// Persist a run and return its identifier
    pub fn save(
        &self,
        run_name: &str,
        params: RunParams,
        metrics: RunMetrics,
        artifacts: &RunArtifacts,
    ) -> Result<RunId> {
        let start_time = Utc::now();
        let run = ModelRun {
            run_id: RunId::generate(start_time),
            run_name: run_name.to_string(),
            experiment: self.experiment().to_string(),
            start_time,
            params,
            metrics,
        };

        let files = [
            Artifact {
                name: MODEL_ARTIFACT,
                bytes: serde_json::to_vec(&artifacts.model)?,
            },
            Artifact {
                name: SCALER_X_ARTIFACT,
                bytes: serde_json::to_vec(&artifacts.scaler_x)?,
            },
            Artifact {
                name: SCALER_Y_ARTIFACT,
                bytes: serde_json::to_vec(&artifacts.scaler_y)?,
            },
        ];
        self.store.create(&run, &files)?;

        tracing::info!(
            run_id = %run.run_id,
            run_name,
            experiment = self.experiment(),
            val_mse = metrics.val_mse,
            "Saved run"
        );
        Ok(run.run_id)
    }

    /// Every run of the experiment
    pub fn list_runs(&self) -> Result<Vec<ModelRun>> {
        self.store.list(self.experiment())
    }

    /// Runs of the experiment matching `key`
    fn runs_for(&self, key: &RunKey) -> Result<Vec<ModelRun>> {
        Ok(self
            .list_runs()?
            .into_iter()
            .filter(|run| key.matches(run))
            .collect())
    }

    /// Best run for a domain and its feature hyperparameters
    ///
    /// Runs are ordered by training MSE, then training MAE, then start time.
    pub fn find_best(
        &self,
        domain: Domain,
        lag: usize,
        sequence_length: usize,
        rolling_mean: usize,
    ) -> Result<ModelRun> {
        let key = RunKey::new(
            domain,
            HyperparamConfig {
                lag,
                rolling_mean,
                sequence_length,
            },
        );
        self.find_best_for(&key)
    }

    /// [`find_best`](Self::find_best) for a [`RunKey`]
    pub fn find_best_for(&self, key: &RunKey) -> Result<ModelRun> {
        if !self.store.has_experiment(self.experiment())? {
            return Err(ForecastError::NoRunFound(format!(
                "Experiment {} does not exist",
                self.experiment()
            )));
        }

        self.runs_for(key)?
            .into_iter()
            .min_by(by_training_error)
            .ok_or_else(|| ForecastError::NoRunFound(format!("No run for {}", key)))
    }

    /// Load the model and both scalers of a run
    pub fn load_artifacts(&self, run_id: &RunId) -> Result<RunArtifacts> {
        let read = |name: &str| self.store.read_artifact(self.experiment(), run_id, name);

        let model = read(MODEL_ARTIFACT)?
            .ok_or_else(|| ForecastError::ModelNotLoaded(format!("Run {} has no model", run_id)))
            .and_then(|bytes| {
                serde_json::from_slice::<LstmRegressor>(&bytes).map_err(|e| {
                    ForecastError::ModelNotLoaded(format!("Run {}: {}", run_id, e))
                })
            })?;

        let scaler = |name: &str| -> Result<ScalingPipeline> {
            let bytes = read(name)?.ok_or_else(|| {
                ForecastError::ScalerNotLoaded(format!("Run {} has no {}", run_id, name))
            })?;
            serde_json::from_slice(&bytes).map_err(|e| {
                ForecastError::ScalerNotLoaded(format!("Run {} {}: {}", run_id, name, e))
            })
        };

        Ok(RunArtifacts {
            model,
            scaler_x: scaler(SCALER_X_ARTIFACT)?,
            scaler_y: scaler(SCALER_Y_ARTIFACT)?,
        })
    }

    /// Delete one run
    pub fn delete_run(&self, run_id: &RunId) -> Result<()> {
        self.store.delete(self.experiment(), run_id)?;
        tracing::debug!(run_id = %run_id, "Deleted run");
        Ok(())
    }

    fn prune_key(&self, key: &RunKey, deleted: &mut Vec<RunId>) -> Result<()> {
        let mut runs = self.runs_for(key)?;
        runs.sort_by(by_validation_error);

        if let Some(best) = runs.first() {
            tracing::debug!(key = %key, run_id = %best.run_id, "Keeping best run");
        }
        for run in runs.iter().skip(1) {
            self.delete_run(&run.run_id)?;
            deleted.push(run.run_id.clone());
        }
        Ok(())
    }

    /// Keep only the run with the lowest validation MSE for each key
    pub fn prune(&self, keys: &[RunKey]) -> PruneReport {
        let mut report = PruneReport::default();
        for key in keys {
            if let Err(err) = self.prune_key(key, &mut report.deleted) {
                tracing::warn!(key = %key, error = %err, "Pruning failed");
                report.failures.push((*key, err.to_string()));
            }
        }
        tracing::info!(deleted = report.deleted.len(), "Pruned registry");
        report
    }
}
