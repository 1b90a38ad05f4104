//! Train command: one optimization cycle

use crate::{load_sources, open_registry, GlobalArgs};
use anyhow::{bail, Result};
use clap::Args;
use growth_forecast::{Domain, Horizon, ModelOptimizer};
use tracing::{info, warn};

/// Train every domain and horizon once, then prune the registry
#[derive(Args, Debug, Clone, Default)]
pub struct TrainCommand {
    /// Only train these domains (repeatable)
    #[arg(long = "domain")]
    pub domains: Vec<Domain>,

    /// Only train these horizons (repeatable)
    #[arg(long = "horizon")]
    pub horizons: Vec<Horizon>,
}

impl TrainCommand {
    pub(crate) fn restrict(&self, mut optimizer: ModelOptimizer) -> ModelOptimizer {
        if !self.domains.is_empty() {
            optimizer = optimizer.with_domains(self.domains.clone());
        }
        if !self.horizons.is_empty() {
            optimizer = optimizer.with_horizons(self.horizons.clone());
        }
        optimizer
    }

    pub async fn run(&self, global: &GlobalArgs) -> Result<()> {
        let config = global.load_config()?;
        let optimizer = self.restrict(ModelOptimizer::from_config(
            &config,
            load_sources(&config)?,
            open_registry(&config)?,
        )?);

        let report = optimizer.run_cycle().await;
        for outcome in &report.outcomes {
            match &outcome.result {
                Ok(Some(run_id)) => {
                    info!(domain = %outcome.domain, horizon = %outcome.horizon, run_id = %run_id, "Saved run")
                }
                Ok(None) => {
                    warn!(domain = %outcome.domain, horizon = %outcome.horizon, "No usable model")
                }
                Err(_) => {}
            }
        }

        let failed = report.failures().count();
        if !report.outcomes.is_empty() && failed == report.outcomes.len() {
            bail!("All {} training jobs failed", failed);
        }
        println!(
            "{} jobs, {} runs saved, {} failed, {} runs pruned",
            report.outcomes.len(),
            report.saved().count(),
            failed,
            report.prune.deleted.len()
        );
        Ok(())
    }
}
