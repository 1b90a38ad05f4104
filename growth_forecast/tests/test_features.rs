use approx::assert_relative_eq;
use growth_forecast::data::CountSeries;
use growth_forecast::features::{lag_column, FeatureEngineer, ROLLING_MEAN, TARGET};
use growth_forecast::{ForecastError, HyperparamConfig};
use rstest::rstest;

fn week_series() -> (CountSeries, Vec<f64>) {
    let counts = [5, 3, 8, 1, 9, 2, 7];
    let keys: Vec<String> = (1..=counts.len()).map(|d| format!("2024-03-{:02}", d)).collect();
    let series =
        CountSeries::from_pairs(keys.iter().map(String::as_str).zip(counts.iter().copied())).unwrap();
    (series, counts.iter().map(|&c| c as f64).collect())
}

#[test]
fn test_head_rows_dropped() {
    let series = CountSeries::from_pairs([
        ("2024-01-01", 1),
        ("2024-01-02", 1),
        ("2024-01-03", 1),
        ("2024-01-04", 1),
    ])
    .unwrap();
    let config = HyperparamConfig::new(1, 2, 1).unwrap();
    let table = FeatureEngineer::new(config).unwrap().build(&series).unwrap();

    assert_eq!(table.height(), 2);
    let timestamps = table.timestamps().unwrap();
    assert!(timestamps.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(table.column_values(&lag_column(1)).unwrap(), vec![1.0, 1.0]);
    assert_eq!(table.column_values(ROLLING_MEAN).unwrap(), vec![1.0, 1.0]);
}

#[test]
fn test_empty_series_unavailable() {
    let config = HyperparamConfig::new(2, 3, 5).unwrap();
    let result = FeatureEngineer::new(config).unwrap().build(&CountSeries::new());
    assert!(matches!(result, Err(ForecastError::DataUnavailable(_))));
}

#[test]
fn test_too_short_series_has_no_rows() {
    let (series, _) = week_series();
    let config = HyperparamConfig::new(7, 1, 1).unwrap();
    let result = FeatureEngineer::new(config).unwrap().build(&series);
    assert!(matches!(result, Err(ForecastError::InsufficientHistory(_))));
}

#[rstest]
#[case(1, 1)]
#[case(2, 3)]
#[case(3, 2)]
#[case(4, 4)]
fn test_lag_and_rolling_values(#[case] lag: usize, #[case] rolling_mean: usize) {
    let (series, counts) = week_series();
    let config = HyperparamConfig::new(lag, rolling_mean, 1).unwrap();
    let table = FeatureEngineer::new(config).unwrap().build(&series).unwrap();

    let warmup = lag.max(rolling_mean);
    assert_eq!(table.height(), counts.len() - warmup);

    let target = table.column_values(TARGET).unwrap();
    let rolling = table.column_values(ROLLING_MEAN).unwrap();
    for row in 0..table.height() {
        let k = row + warmup;
        assert_eq!(target[row], counts[k]);

        for i in 1..=lag {
            let lagged = table.column_values(&lag_column(i)).unwrap();
            assert_eq!(lagged[row], counts[k - i]);
        }

        let expected: f64 = counts[k - rolling_mean..k].iter().sum::<f64>() / rolling_mean as f64;
        assert_relative_eq!(rolling[row], expected, epsilon = 1e-12);
    }
}

#[test]
fn test_feature_matrix_never_contains_target() {
    let (series, _) = week_series();
    let config = HyperparamConfig::new(2, 2, 1).unwrap();
    let table = FeatureEngineer::new(config).unwrap().build(&series).unwrap();

    let x = table.features().unwrap();
    let y = table.target().unwrap();
    assert_eq!(x.ncols(), 1 + 2 + 1);
    assert_eq!(x.nrows(), y.len());

    let timestamps = table.timestamps().unwrap();
    for (row, ts) in timestamps.iter().enumerate() {
        assert_eq!(x[[row, 0]], *ts as f64);
    }
}
