use chrono::NaiveDate;
use growth_forecast::data::{CountSeries, Granularity, SeriesRange};
use growth_forecast::source::{CountSource, EventLogSource};
use growth_forecast::ForecastError;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::io::Write;
use tempfile::NamedTempFile;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn sample_source() -> EventLogSource {
    EventLogSource::new(vec![
        date(2024, 1, 3),
        date(2024, 1, 1),
        date(2024, 2, 10),
        date(2024, 1, 1),
        date(2025, 3, 1),
    ])
    .with_today(date(2025, 3, 2))
}

#[test]
fn test_daily_counts_without_zero_fill() {
    let series = sample_source()
        .fetch(SeriesRange::all(Granularity::Day), false)
        .unwrap();

    assert_eq!(
        series.growth,
        CountSeries::from_pairs([
            ("2024-01-01", 2),
            ("2024-01-03", 1),
            ("2024-02-10", 1),
            ("2025-03-01", 1),
        ])
        .unwrap()
    );
    assert_eq!(series.cumulative_growth.values(), vec![2, 3, 4, 5]);
    assert!(!series.growth.is_contiguous());
}

#[test]
fn test_monthly_zero_fill_forward_fills_cumulative() {
    let series = sample_source()
        .fetch(SeriesRange::all(Granularity::Month), true)
        .unwrap();

    assert_eq!(series.growth.len(), 15);
    assert!(series.growth.is_contiguous());
    assert_eq!(series.growth.keys()[0].to_string(), "2024-01");
    assert_eq!(series.growth.last_key().unwrap().to_string(), "2025-03");

    let growth = series.growth.values();
    assert_eq!(&growth[..3], &[3, 1, 0]);
    assert_eq!(growth[14], 1);

    let cumulative = series.cumulative_growth.values();
    assert_eq!(&cumulative[..3], &[3, 4, 4]);
    assert_eq!(cumulative[13], 4);
    assert_eq!(cumulative[14], 5);
}

#[test]
fn test_yearly_counts() {
    let series = sample_source()
        .fetch(SeriesRange::all(Granularity::Year), true)
        .unwrap();
    assert_eq!(
        series.growth,
        CountSeries::from_pairs([("2024", 4), ("2025", 1)]).unwrap()
    );
    assert_eq!(series.cumulative_growth.values(), vec![4, 5]);
}

#[test]
fn test_daily_zero_fill_reaches_today() {
    let series = sample_source()
        .fetch(SeriesRange::last(Granularity::Day, 3), true)
        .unwrap();

    assert_eq!(
        series.growth,
        CountSeries::from_pairs([("2025-02-28", 0), ("2025-03-01", 1), ("2025-03-02", 0)]).unwrap()
    );
    assert_eq!(series.cumulative_growth.values(), vec![4, 5, 5]);
}

#[test]
fn test_last_periods_without_zero_fill_counts_window_only() {
    let series = sample_source()
        .fetch(SeriesRange::last(Granularity::Day, 2), false)
        .unwrap();
    assert_eq!(
        series.growth,
        CountSeries::from_pairs([("2025-03-01", 1)]).unwrap()
    );
    assert_eq!(series.cumulative_growth.values(), vec![1]);
}

#[rstest]
#[case(Granularity::Day)]
#[case(Granularity::Month)]
#[case(Granularity::Year)]
fn test_empty_log_is_unavailable(#[case] granularity: Granularity) {
    let source = EventLogSource::new(Vec::new()).with_today(date(2025, 1, 1));
    let result = source.fetch(SeriesRange::all(granularity), true);
    assert!(matches!(result, Err(ForecastError::DataUnavailable(_))));
}

#[test]
fn test_json_loader() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"[
            {{"id": 1, "orderDate": "2024-01-01T10:15:00.000"}},
            {{"id": 2, "orderDate": "2024-01-01T23:59:59.999"}},
            {{"id": 3, "orderDate": "2024-01-02T00:00:00.000"}}
        ]"#
    )
    .unwrap();

    let source = EventLogSource::from_json_file(file.path(), "orderDate").unwrap();
    assert_eq!(source.len(), 3);

    let series = source
        .with_today(date(2024, 1, 2))
        .fetch(SeriesRange::all(Granularity::Day), true)
        .unwrap();
    assert_eq!(series.growth.values(), vec![2, 1]);
}

#[test]
fn test_json_loader_missing_field() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, r#"[{{"signedUp": "2024-01-01"}}, {{"name": "x"}}]"#).unwrap();

    let result = EventLogSource::from_json_file(file.path(), "signedUp");
    assert!(matches!(result, Err(ForecastError::InvalidParameter(_))));
}

#[test]
fn test_csv_loader() {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(file, "id,signedUp").unwrap();
    writeln!(file, "1,2023-12-31T22:00:00Z").unwrap();
    writeln!(file, "2,2024-01-15").unwrap();
    writeln!(file, "3,2024-01-20T08:00:00.5").unwrap();

    let source = EventLogSource::from_path(file.path(), "signedUp")
        .unwrap()
        .with_today(date(2024, 1, 31));
    let series = source
        .fetch(SeriesRange::all(Granularity::Month), false)
        .unwrap();
    assert_eq!(
        series.growth,
        CountSeries::from_pairs([("2023-12", 1), ("2024-01", 2)]).unwrap()
    );
}

#[test]
fn test_csv_loader_missing_column() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "id,created").unwrap();
    writeln!(file, "1,2024-01-01").unwrap();

    let result = EventLogSource::from_csv_file(file.path(), "signedUp");
    assert!(matches!(result, Err(ForecastError::InvalidParameter(_))));
}
