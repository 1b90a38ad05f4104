//! `growth` binary: training, scheduling and serving growth forecasts

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use growth_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("growth=info".parse()?))
        .init();

    let cli = Cli::parse();
    info!("Growth CLI starting...");

    match &cli.command {
        Commands::Train(cmd) => cmd.run(&cli.global).await?,
        Commands::Schedule(cmd) => cmd.run(&cli.global).await?,
        Commands::Predict(cmd) => cmd.run(&cli.global).await?,
    }
    Ok(())
}
