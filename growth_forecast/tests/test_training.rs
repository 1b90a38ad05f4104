use chrono::{Days, NaiveDate};
use growth_forecast::registry::ModelRegistry;
use growth_forecast::source::{CountSource, EventLogSource};
use growth_forecast::training::{HyperparameterSearch, TrainingGrid, TrainingJob};
use growth_forecast::{Domain, ForecastError, Horizon, HyperparamConfig, Splitter};
use std::sync::Arc;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
}

fn daily_source(days: u64) -> EventLogSource {
    let start = today().checked_sub_days(Days::new(days - 1)).unwrap();
    let mut events = Vec::new();
    for d in 0..days {
        let date = start.checked_add_days(Days::new(d)).unwrap();
        for _ in 0..(1 + d * 7 % 5) {
            events.push(date);
        }
    }
    EventLogSource::new(events).with_today(today())
}

fn fast_grid() -> TrainingGrid {
    TrainingGrid {
        num_units: vec![4, 6],
        dropout: vec![0.0],
        learning_rate: vec![0.01],
        epochs: vec![3],
        l2_reg: vec![0.0],
        batch_size: 16,
        seed: 7,
    }
}

fn job(
    domain: Domain,
    hyperparams: HyperparamConfig,
    source: Arc<dyn CountSource>,
    registry: &ModelRegistry,
) -> TrainingJob {
    TrainingJob {
        domain,
        horizon: Horizon::OneDay,
        hyperparams,
        source,
        registry: registry.clone(),
        search: HyperparameterSearch::new(fast_grid()).unwrap(),
        splitter: Splitter::default(),
    }
}

#[test]
fn test_job_persists_best_grid_point() {
    let registry = ModelRegistry::in_memory("GrowthEx");
    let hp = Horizon::OneDay.default_hyperparams();
    let training = job(Domain::CustomerGrowth, hp, Arc::new(daily_source(60)), &registry);

    let run_id = training.run().unwrap().expect("a run should be saved");

    let runs = registry.list_runs().unwrap();
    assert_eq!(runs.len(), 1);
    let run = &runs[0];
    assert_eq!(run.run_id, run_id);
    assert_eq!(run.run_name, "CustomerGrowth");
    assert_eq!(run.params.hyperparams(), hp);
    assert!([4, 6].contains(&run.params.num_units));
    assert!((1..=3).contains(&run.params.epoch));
    assert!(run.metrics.val_mse.is_finite());

    let artifacts = registry.load_artifacts(&run_id).unwrap();
    assert_eq!(artifacts.model.config().hidden_size, run.params.num_units);
    assert_eq!(artifacts.scaler_x.n_features(), 1 + hp.lag + 1);
}

#[test]
fn test_search_keeps_lowest_validation_error() {
    let registry = ModelRegistry::in_memory("GrowthEx");
    let hp = Horizon::OneDay.default_hyperparams();
    let training = job(Domain::OrdersGrowth, hp, Arc::new(daily_source(60)), &registry);
    training.run().unwrap();

    let run = registry.find_best(Domain::OrdersGrowth, 2, 5, 3).unwrap();
    let grid_best = {
        let source = daily_source(60);
        let series = source
            .fetch(
                growth_forecast::SeriesRange::all(growth_forecast::Granularity::Day),
                true,
            )
            .unwrap()
            .growth;
        let table = growth_forecast::FeatureEngineer::new(hp).unwrap().build(&series).unwrap();
        let split = Splitter::default().split(&table).unwrap();
        let sequencer = growth_forecast::sequence::Sequencer::new(hp.sequence_length);
        let train = sequencer.windows(split.x_train.view(), split.y_train.view()).unwrap();
        let val = sequencer.windows(split.x_test.view(), split.y_test.view()).unwrap();
        let outcome = HyperparameterSearch::new(fast_grid()).unwrap().run(&train, &val).unwrap();
        assert_eq!(outcome.trials.len(), 2);
        outcome
            .trials
            .iter()
            .map(|t| t.metrics.val_mse)
            .fold(f64::INFINITY, f64::min)
    };
    assert_eq!(run.metrics.val_mse, grid_best);
}

#[test]
fn test_no_validation_windows_persists_nothing() {
    let registry = ModelRegistry::in_memory("GrowthEx");
    let hp = HyperparamConfig::new(1, 1, 5).unwrap();
    let training = job(Domain::CustomerGrowth, hp, Arc::new(daily_source(10)), &registry);

    assert_eq!(training.run().unwrap(), None);
    assert!(registry.list_runs().unwrap().is_empty());
}

#[test]
fn test_no_training_windows_is_insufficient_data() {
    let registry = ModelRegistry::in_memory("GrowthEx");
    let hp = HyperparamConfig::new(1, 1, 5).unwrap();
    let training = job(Domain::CustomerGrowth, hp, Arc::new(daily_source(6)), &registry);

    assert!(matches!(
        training.run(),
        Err(ForecastError::InsufficientData(_))
    ));
    assert!(registry.list_runs().unwrap().is_empty());
}

#[test]
fn test_empty_source_is_unavailable() {
    let registry = ModelRegistry::in_memory("GrowthEx");
    let source = EventLogSource::new(Vec::new()).with_today(today());
    let training = job(
        Domain::CumulativeOrdersGrowth,
        Horizon::OneDay.default_hyperparams(),
        Arc::new(source),
        &registry,
    );

    assert!(matches!(
        training.run(),
        Err(ForecastError::DataUnavailable(_))
    ));
}
