//! Training cycles over every (domain, horizon) pair
//!
//! A cycle spawns one blocking training job per pair, waits for all of them
//! and only then prunes the registry. The schedule repeats cycles on a fixed
//! interval until a shutdown future resolves.

use crate::config::ForecastConfig;
use crate::error::{ForecastError, Result};
use crate::horizon::{Domain, Horizon, HyperparamTable};
use crate::registry::{ModelRegistry, PruneReport, RunId, RunKey};
use crate::source::SourceSet;
use crate::split::Splitter;
use crate::training::{HyperparameterSearch, TrainingGrid, TrainingJob};
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

/// Result of one training job
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub domain: Domain,
    pub horizon: Horizon,
    /// Saved run, `None` when nothing was persisted, or the failure message
    pub result: std::result::Result<Option<RunId>, String>,
}

/// Everything that happened in one cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub outcomes: Vec<JobOutcome>,
    pub prune: PruneReport,
}

impl CycleReport {
    /// Jobs that returned an error or panicked
    pub fn failures(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    /// Runs saved during the cycle
    pub fn saved(&self) -> impl Iterator<Item = &RunId> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().and_then(Option::as_ref))
    }
}

/// Drives training for every domain and horizon
#[derive(Debug, Clone)]
pub struct ModelOptimizer {
    sources: SourceSet,
    registry: ModelRegistry,
    hyperparams: HyperparamTable,
    search: HyperparameterSearch,
    splitter: Splitter,
    domains: Vec<Domain>,
    horizons: Vec<Horizon>,
}

impl ModelOptimizer {
    /// Create an optimizer covering every domain and horizon
    pub fn new(
        sources: SourceSet,
        registry: ModelRegistry,
        hyperparams: HyperparamTable,
        grid: TrainingGrid,
        splitter: Splitter,
    ) -> Result<Self> {
        hyperparams.validate()?;
        Ok(Self {
            sources,
            registry,
            hyperparams,
            search: HyperparameterSearch::new(grid)?,
            splitter,
            domains: Domain::ALL.to_vec(),
            horizons: Horizon::ALL.to_vec(),
        })
    }

    /// Create an optimizer from the service configuration
    pub fn from_config(
        config: &ForecastConfig,
        sources: SourceSet,
        registry: ModelRegistry,
    ) -> Result<Self> {
        Self::new(
            sources,
            registry,
            config.hyperparams.clone(),
            config.grid.clone(),
            Splitter::new(config.test_fraction)?,
        )
    }

    /// Restrict the cycle to some domains
    pub fn with_domains(mut self, domains: Vec<Domain>) -> Self {
        self.domains = domains;
        self
    }

    /// Restrict the cycle to some horizons
    pub fn with_horizons(mut self, horizons: Vec<Horizon>) -> Self {
        self.horizons = horizons;
        self
    }

    /// Registry the optimizer writes to
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Registry keys covered by a cycle, horizon-major
    pub fn keys(&self) -> Vec<RunKey> {
        self.horizons
            .iter()
            .flat_map(|&horizon| {
                self.domains
                    .iter()
                    .map(move |&domain| RunKey::new(domain, self.hyperparams.get(horizon)))
            })
            .collect()
    }

    /// One training job per horizon and domain
    pub fn jobs(&self) -> Vec<TrainingJob> {
        self.horizons
            .iter()
            .flat_map(|&horizon| {
                self.domains.iter().map(move |&domain| TrainingJob {
                    domain,
                    horizon,
                    hyperparams: self.hyperparams.get(horizon),
                    source: self.sources.get(domain.source()).clone(),
                    registry: self.registry.clone(),
                    search: self.search.clone(),
                    splitter: self.splitter,
                })
            })
            .collect()
    }

    /// Train every pair concurrently, wait for all jobs, then prune
    pub async fn run_cycle(&self) -> CycleReport {
        let mut set = JoinSet::new();
        for job in self.jobs() {
            set.spawn_blocking(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| job.run()))
                    .unwrap_or_else(|_| {
                        Err(ForecastError::Training("Training job panicked".to_string()))
                    })
                    .map_err(|e| e.to_string());
                JobOutcome {
                    domain: job.domain,
                    horizon: job.horizon,
                    result,
                }
            });
        }

        let mut report = CycleReport::default();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(outcome) => {
                    if let Err(error) = &outcome.result {
                        tracing::error!(
                            domain = %outcome.domain,
                            horizon = %outcome.horizon,
                            error = %error,
                            "Training job failed"
                        );
                    }
                    report.outcomes.push(outcome);
                }
                Err(error) => tracing::error!(error = %error, "Training task did not complete"),
            }
        }

        let registry = self.registry.clone();
        let keys = self.keys();
        match tokio::task::spawn_blocking(move || registry.prune(&keys)).await {
            Ok(prune) => report.prune = prune,
            Err(error) => tracing::error!(error = %error, "Pruning task did not complete"),
        }

        tracing::info!(
            jobs = report.outcomes.len(),
            failed = report.failures().count(),
            saved = report.saved().count(),
            pruned = report.prune.deleted.len(),
            "Optimization cycle finished"
        );
        report
    }

    /// Run a cycle every `period`, starting immediately, until `shutdown` resolves
    ///
    /// Returns the number of completed cycles.
    pub async fn run_schedule<F>(&self, period: Duration, shutdown: F) -> Result<usize>
    where
        F: Future<Output = ()>,
    {
        if period.is_zero() {
            return Err(ForecastError::InvalidParameter(
                "Schedule interval must be positive".to_string(),
            ));
        }

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut cycles = 0;
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!(cycles, "Schedule stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let report = self.run_cycle().await;
                    cycles += 1;
                    if report.failures().next().is_some() {
                        tracing::warn!(cycle = cycles, "Cycle finished with failed jobs");
                    }
                }
            }
        }
        Ok(cycles)
    }
}
