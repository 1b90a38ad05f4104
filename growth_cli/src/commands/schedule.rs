//! Schedule command: training cycles until Ctrl-C

use super::TrainCommand;
use crate::{load_sources, open_registry, GlobalArgs};
use anyhow::Result;
use clap::Args;
use growth_forecast::ModelOptimizer;
use std::time::Duration;
use tracing::{info, warn};

/// Run a training cycle now and then on every interval
#[derive(Args, Debug, Clone, Default)]
pub struct ScheduleCommand {
    /// Seconds between cycles, overriding `schedule_interval_secs`
    #[arg(long)]
    pub interval_secs: Option<u64>,

    #[command(flatten)]
    pub filter: TrainCommand,
}

impl ScheduleCommand {
    pub async fn run(&self, global: &GlobalArgs) -> Result<()> {
        let config = global.load_config()?;
        let period = self
            .interval_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| config.schedule_interval());
        let optimizer = self.filter.restrict(ModelOptimizer::from_config(
            &config,
            load_sources(&config)?,
            open_registry(&config)?,
        )?);

        info!(period_secs = period.as_secs(), "Starting schedule");
        let cycles = optimizer
            .run_schedule(period, async {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    warn!(error = %err, "Cannot listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
            })
            .await?;
        println!("Stopped after {} cycles", cycles);
        Ok(())
    }
}
