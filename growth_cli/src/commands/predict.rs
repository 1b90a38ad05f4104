//! Predict command

use crate::{load_sources, open_registry, GlobalArgs};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;
use growth_forecast::{DataPredictor, Domain, Horizon};

/// Forecast one domain over one horizon
#[derive(Args, Debug, Clone)]
pub struct PredictCommand {
    /// CustomerGrowth, CumulativeCustomerGrowth, OrdersGrowth or CumulativeOrdersGrowth
    #[arg(long)]
    pub domain: Domain,

    /// one_day, seven_days, month or year
    #[arg(long)]
    pub horizon: Horizon,

    /// Date the labels count from (defaults to today, UTC)
    #[arg(long)]
    pub today: Option<NaiveDate>,
}

impl PredictCommand {
    pub async fn run(&self, global: &GlobalArgs) -> Result<()> {
        let config = global.load_config()?;
        let predictor = DataPredictor::new(
            load_sources(&config)?,
            open_registry(&config)?,
            config.hyperparams.clone(),
        );

        let forecast = match self.today {
            Some(today) => predictor.predict_on(self.domain, self.horizon, today),
            None => predictor.predict(self.domain, self.horizon),
        }
        .map_err(|err| {
            let status = err.http_status();
            anyhow::Error::new(err).context(format!("Forecast unavailable (status {})", status))
        })?;

        let json = serde_json::to_string_pretty(&forecast.to_json())
            .context("Failed to render forecast")?;
        println!("{}", json);
        Ok(())
    }
}
