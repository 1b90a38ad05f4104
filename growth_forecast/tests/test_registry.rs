use approx::assert_relative_eq;
use growth_forecast::models::{LstmConfig, LstmRegressor, SequenceModel};
use growth_forecast::registry::{
    FileRunStore, MemoryRunStore, ModelRegistry, RegistryConfig, RunArtifacts, RunId, RunKey,
    RunMetrics, RunParams, RunStore, MODEL_ARTIFACT, SCALER_Y_ARTIFACT,
};
use growth_forecast::{Domain, ForecastError, HyperparamConfig};
use growth_math::ScalingPipeline;
use ndarray::{Array2, Array3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn artifacts(seed: u64) -> RunArtifacts {
    let mut rng = StdRng::seed_from_u64(seed);
    let config = LstmConfig {
        input_size: 3,
        hidden_size: 4,
        dropout: 0.1,
        learning_rate: 1e-3,
        l2_reg: 1e-4,
    };
    let x = Array2::from_shape_fn((6, 3), |(i, j)| (i + j * 2) as f64);
    let y = Array2::from_shape_fn((6, 1), |(i, _)| (i * 3) as f64);
    RunArtifacts {
        model: LstmRegressor::new(config, &mut rng).unwrap(),
        scaler_x: ScalingPipeline::fit(x.view()).unwrap(),
        scaler_y: ScalingPipeline::fit(y.view()).unwrap(),
    }
}

fn params(lag: usize, rolling_mean: usize, sequence_length: usize) -> RunParams {
    RunParams {
        num_units: 4,
        dropout: 0.1,
        learning_rate: 1e-3,
        epoch: 3,
        l2_reg: 1e-4,
        lag,
        rolling_mean,
        sequence_length,
    }
}

fn metrics(train_mse: f64, train_mae: f64, val_mse: f64) -> RunMetrics {
    RunMetrics {
        train_mse,
        val_mse,
        train_mae,
        val_mae: val_mse.sqrt(),
    }
}

fn one_day_key(domain: Domain) -> RunKey {
    RunKey::new(domain, HyperparamConfig::new(2, 3, 5).unwrap())
}

/// Distinct start times order runs saved back to back
fn pause() {
    thread::sleep(Duration::from_millis(2));
}

fn file_registry(dir: &TempDir) -> ModelRegistry {
    ModelRegistry::open(RegistryConfig {
        tracking_uri: format!("file://{}", dir.path().display()),
        experiment: "GrowthEx".to_string(),
    })
    .unwrap()
}

#[test]
fn test_save_find_load_round_trip() {
    let dir = TempDir::new().unwrap();
    let registry = file_registry(&dir);
    let original = artifacts(1);

    let run_id = registry
        .save("CustomerGrowth", params(2, 3, 5), metrics(0.5, 0.4, 0.6), &original)
        .unwrap();

    let best = registry.find_best(Domain::CustomerGrowth, 2, 5, 3).unwrap();
    assert_eq!(best.run_id, run_id);
    assert_eq!(best.run_name, "CustomerGrowth");
    assert_eq!(best.experiment, "GrowthEx");
    assert_eq!(best.params, params(2, 3, 5));

    let loaded = registry.load_artifacts(&run_id).unwrap();
    let windows = Array3::from_shape_fn((2, 5, 3), |(i, t, j)| (i + t + j) as f64 * 0.1);
    let expected = original.model.predict(windows.view()).unwrap();
    let actual = loaded.model.predict(windows.view()).unwrap();
    for (a, e) in actual.iter().zip(expected.iter()) {
        assert_relative_eq!(*a, *e, max_relative = 1e-9);
    }
    assert_eq!(loaded.scaler_x.n_features(), 3);
    assert_eq!(loaded.scaler_y.n_features(), 1);

    let run_dir = dir.path().join("GrowthEx").join(run_id.as_str());
    for file in ["meta.json", "model.json", "scaler_X.json", "scaler_y.json"] {
        assert!(run_dir.join(file).is_file(), "missing {}", file);
    }
}

#[test]
fn test_save_leaves_no_staging_directories() {
    let dir = TempDir::new().unwrap();
    let registry = file_registry(&dir);
    registry
        .save("OrdersGrowth", params(2, 3, 5), metrics(0.5, 0.4, 0.6), &artifacts(2))
        .unwrap();

    let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("GrowthEx"))
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with('.'))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_missing_experiment_has_no_run() {
    let dir = TempDir::new().unwrap();
    let registry = file_registry(&dir);
    let result = registry.find_best(Domain::CustomerGrowth, 2, 5, 3);
    assert!(matches!(result, Err(ForecastError::NoRunFound(_))));
}

#[test]
fn test_find_best_uses_typed_filters() {
    let registry = ModelRegistry::in_memory("GrowthEx");
    registry
        .save("CustomerGrowth", params(2, 3, 7), metrics(0.1, 0.1, 0.1), &artifacts(3))
        .unwrap();
    registry
        .save("CumulativeCustomerGrowth", params(2, 3, 5), metrics(0.1, 0.1, 0.1), &artifacts(3))
        .unwrap();

    let result = registry.find_best(Domain::CustomerGrowth, 2, 5, 3);
    assert!(matches!(result, Err(ForecastError::NoRunFound(_))));

    let matched = registry.find_best(Domain::CustomerGrowth, 2, 7, 3).unwrap();
    assert_eq!(matched.params.sequence_length, 7);
}

#[test]
fn test_find_best_ordering() {
    let registry = ModelRegistry::in_memory("GrowthEx");
    registry
        .save("OrdersGrowth", params(2, 3, 5), metrics(0.9, 0.1, 0.1), &artifacts(4))
        .unwrap();
    pause();
    let tie_first = registry
        .save("OrdersGrowth", params(2, 3, 5), metrics(0.2, 0.3, 0.8), &artifacts(4))
        .unwrap();
    pause();
    registry
        .save("OrdersGrowth", params(2, 3, 5), metrics(0.2, 0.3, 0.7), &artifacts(4))
        .unwrap();
    pause();
    registry
        .save("OrdersGrowth", params(2, 3, 5), metrics(0.2, 0.5, 0.1), &artifacts(4))
        .unwrap();

    let best = registry.find_best(Domain::OrdersGrowth, 2, 5, 3).unwrap();
    assert_eq!(best.run_id, tie_first);
}

#[test]
fn test_prune_keeps_lowest_validation_error_per_key() {
    let registry = ModelRegistry::in_memory("GrowthEx");
    let customers = one_day_key(Domain::CustomerGrowth);
    let orders = one_day_key(Domain::OrdersGrowth);

    let mut customer_runs = Vec::new();
    for val_mse in [0.4, 0.2, 0.3] {
        customer_runs.push(
            registry
                .save("CustomerGrowth", params(2, 3, 5), metrics(0.1, 0.1, val_mse), &artifacts(5))
                .unwrap(),
        );
        pause();
    }
    let single_order = registry
        .save("OrdersGrowth", params(2, 3, 5), metrics(0.1, 0.1, 0.9), &artifacts(5))
        .unwrap();
    let other_key = registry
        .save("CustomerGrowth", params(3, 7, 7), metrics(0.1, 0.1, 0.9), &artifacts(5))
        .unwrap();

    let report = registry.prune(&[customers, orders]);
    assert_eq!(report.deleted.len(), 2);
    assert!(report.failures.is_empty());
    assert!(report.deleted.contains(&customer_runs[0]));
    assert!(report.deleted.contains(&customer_runs[2]));

    let mut remaining: Vec<RunId> = registry.list_runs().unwrap().into_iter().map(|r| r.run_id).collect();
    remaining.sort();
    let mut expected = vec![customer_runs[1].clone(), single_order, other_key];
    expected.sort();
    assert_eq!(remaining, expected);

    let again = registry.prune(&[customers, orders]);
    assert!(again.deleted.is_empty());
}

#[test]
fn test_missing_artifacts_map_to_not_loaded() {
    let store = Arc::new(MemoryRunStore::default());
    let registry = ModelRegistry::new(RegistryConfig::default(), store.clone());

    let first = registry
        .save("CustomerGrowth", params(2, 3, 5), metrics(0.1, 0.1, 0.1), &artifacts(6))
        .unwrap();
    assert!(store.remove_artifact("GrowthEx", &first, MODEL_ARTIFACT).unwrap());
    assert!(matches!(
        registry.load_artifacts(&first),
        Err(ForecastError::ModelNotLoaded(_))
    ));

    let second = registry
        .save("CustomerGrowth", params(2, 3, 5), metrics(0.1, 0.1, 0.1), &artifacts(6))
        .unwrap();
    assert!(store.remove_artifact("GrowthEx", &second, SCALER_Y_ARTIFACT).unwrap());
    assert!(matches!(
        registry.load_artifacts(&second),
        Err(ForecastError::ScalerNotLoaded(_))
    ));
}

#[test]
fn test_corrupt_model_file_is_not_loaded() {
    let dir = TempDir::new().unwrap();
    let registry = file_registry(&dir);
    let run_id = registry
        .save("OrdersGrowth", params(2, 3, 5), metrics(0.1, 0.1, 0.1), &artifacts(7))
        .unwrap();

    let model_path = dir.path().join("GrowthEx").join(run_id.as_str()).join(MODEL_ARTIFACT);
    std::fs::write(&model_path, b"{not json").unwrap();
    assert!(matches!(
        registry.load_artifacts(&run_id),
        Err(ForecastError::ModelNotLoaded(_))
    ));

    std::fs::remove_file(&model_path).unwrap();
    assert!(matches!(
        registry.load_artifacts(&run_id),
        Err(ForecastError::ModelNotLoaded(_))
    ));
}

#[test]
fn test_delete_run() {
    let dir = TempDir::new().unwrap();
    let store = FileRunStore::open(dir.path()).unwrap();
    let registry = ModelRegistry::new(RegistryConfig::default(), Arc::new(store.clone()));

    let run_id = registry
        .save("OrdersGrowth", params(2, 3, 5), metrics(0.1, 0.1, 0.1), &artifacts(8))
        .unwrap();
    assert_eq!(store.list("GrowthEx").unwrap().len(), 1);

    registry.delete_run(&run_id).unwrap();
    assert!(registry.list_runs().unwrap().is_empty());
    assert!(matches!(
        registry.delete_run(&run_id),
        Err(ForecastError::NoRunFound(_))
    ));
}
