use chrono::{Days, NaiveDate, Utc};
use growth_forecast::{
    DataPredictor, Domain, EventLogSource, Horizon, HyperparamTable, ModelOptimizer,
    ModelRegistry, RegistryConfig, SourceSet, Splitter, TrainingGrid,
};
use std::sync::Arc;

/// Two years of signups with a weekly rhythm and slow growth
fn synthetic_events(today: NaiveDate, days: u64, base: u64) -> Vec<NaiveDate> {
    let start = today.checked_sub_days(Days::new(days - 1)).unwrap_or(today);
    (0..days)
        .filter_map(|d| start.checked_add_days(Days::new(d)).map(|date| (d, date)))
        .flat_map(|(d, date)| {
            let count = base + d / 60 + if d % 7 < 5 { 3 } else { 0 };
            std::iter::repeat(date).take(count as usize)
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let today = Utc::now().date_naive();
    let customers = EventLogSource::new(synthetic_events(today, 730, 2)).with_today(today);
    let orders = EventLogSource::new(synthetic_events(today, 730, 5)).with_today(today);
    let sources = SourceSet::new(Arc::new(customers), Arc::new(orders));

    let tracking = tempfile::tempdir()?;
    let registry = ModelRegistry::open(RegistryConfig {
        tracking_uri: tracking.path().display().to_string(),
        experiment: "GrowthEx".to_string(),
    })?;
    println!("Tracking runs in {}", tracking.path().display());

    let grid = TrainingGrid {
        num_units: vec![16, 32],
        epochs: vec![20],
        learning_rate: vec![0.005],
        ..TrainingGrid::default()
    };
    let optimizer = ModelOptimizer::new(
        sources.clone(),
        registry.clone(),
        HyperparamTable::default(),
        grid,
        Splitter::default(),
    )?;

    let report = optimizer.run_cycle().await;
    println!(
        "Trained {} jobs, saved {} runs, {} failed",
        report.outcomes.len(),
        report.saved().count(),
        report.failures().count()
    );
    for failure in report.failures() {
        println!("  {} / {}: {:?}", failure.domain, failure.horizon, failure.result);
    }

    let predictor = DataPredictor::new(sources, registry, HyperparamTable::default());
    for horizon in Horizon::ALL {
        for domain in [Domain::CustomerGrowth, Domain::CumulativeOrdersGrowth] {
            match predictor.predict_on(domain, horizon, today) {
                Ok(forecast) => println!("{} {}: {}", domain, horizon, forecast.to_json()),
                Err(err) => println!("{} {}: {} (HTTP {})", domain, horizon, err, err.http_status()),
            }
        }
    }

    Ok(())
}
