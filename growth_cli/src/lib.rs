//! Growth CLI
//!
//! Command-line front end over `growth_forecast`:
//!
//! - **train**: one optimization cycle over every domain and horizon
//! - **schedule**: repeat cycles on the configured interval until Ctrl-C
//! - **predict**: print the forecast of one domain and horizon as JSON
//!
//! # Example
//!
//! ```bash
//! growth --customers customers.json --orders orders.csv train
//! growth --tracking-uri file:///var/lib/growth/mlruns predict --domain CustomerGrowth --horizon seven_days
//! ```

pub mod commands;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use growth_forecast::{ForecastConfig, ModelRegistry, SourceSet};
use std::path::PathBuf;

pub use commands::{PredictCommand, ScheduleCommand, TrainCommand};

/// Growth forecasting for customers and orders
#[derive(Parser, Debug)]
#[command(name = "growth")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one training cycle and prune the registry
    Train(TrainCommand),

    /// Run training cycles on a fixed interval until interrupted
    Schedule(ScheduleCommand),

    /// Print the forecast of one domain and horizon
    Predict(PredictCommand),
}

/// Options shared by every command; flags override the configuration file
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// JSON configuration file
    #[arg(long, short = 'c', global = true, env = "GROWTH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Registry root, optionally prefixed with file://
    #[arg(long, global = true, env = "GROWTH_TRACKING_URI")]
    pub tracking_uri: Option<String>,

    /// Customer signup export (JSON or CSV)
    #[arg(long, global = true, env = "GROWTH_CUSTOMERS")]
    pub customers: Option<PathBuf>,

    /// Order export (JSON or CSV)
    #[arg(long, global = true, env = "GROWTH_ORDERS")]
    pub orders: Option<PathBuf>,
}

impl GlobalArgs {
    /// Configuration file (or defaults) with the flag overrides applied
    pub fn load_config(&self) -> Result<ForecastConfig> {
        let mut config = match &self.config {
            Some(path) => ForecastConfig::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => ForecastConfig::default(),
        };

        if let Some(uri) = &self.tracking_uri {
            config.registry.tracking_uri = uri.clone();
        }
        if let Some(path) = &self.customers {
            config.sources.customers.path = Some(path.clone());
        }
        if let Some(path) = &self.orders {
            config.sources.orders.path = Some(path.clone());
        }
        Ok(config)
    }
}

/// Open the filesystem registry named by the configuration
pub fn open_registry(config: &ForecastConfig) -> Result<ModelRegistry> {
    ModelRegistry::open(config.registry.clone()).with_context(|| {
        format!(
            "Failed to open registry at {}",
            config.registry.root_path().display()
        )
    })
}

/// Load both event logs named by the configuration
pub fn load_sources(config: &ForecastConfig) -> Result<SourceSet> {
    config
        .sources
        .load()
        .context("Failed to load event logs; pass --customers and --orders")
}
