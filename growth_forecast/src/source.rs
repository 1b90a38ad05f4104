//! Descriptive data sources turning event logs into count series
//!
//! The core only depends on the [`CountSource`] trait. [`EventLogSource`]
//! is the reference implementation over a list of event timestamps, loaded
//! from JSON exports or CSV files.

use crate::data::{CalendarKey, Granularity, GrowthSeries, SeriesRange};
use crate::error::{ForecastError, Result};
use crate::horizon::SourceKind;
use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

/// Produces the growth and cumulative growth series of one source
pub trait CountSource: Send + Sync {
    /// Aggregate events at `range.granularity`, optionally zero-filling gaps
    fn fetch(&self, range: SeriesRange, zero_fill: bool) -> Result<GrowthSeries>;
}

/// Parse an event timestamp into its calendar date
///
/// Accepts `%Y-%m-%dT%H:%M:%S%.f`, RFC 3339 and plain `%Y-%m-%d`.
pub fn parse_event_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(ts.date());
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc).date_naive());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| ForecastError::InvalidParameter(format!("Invalid timestamp {:?}: {}", raw, e)))
}

/// Start of the period `n` periods before the one starting at `start`
fn periods_back(granularity: Granularity, start: NaiveDate, n: u32) -> Option<NaiveDate> {
    match granularity {
        Granularity::Day => start.checked_sub_days(Days::new(u64::from(n))),
        Granularity::Month => start.checked_sub_months(Months::new(n)),
        Granularity::Year => NaiveDate::from_ymd_opt(start.year() - n as i32, 1, 1),
    }
}

/// Count series source over an in-memory event log
#[derive(Debug, Clone)]
pub struct EventLogSource {
    events: Vec<NaiveDate>,
    today: Option<NaiveDate>,
}

impl EventLogSource {
    /// Create a source over event dates; the clock follows the system date
    pub fn new<I>(events: I) -> Self
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let mut events: Vec<NaiveDate> = events.into_iter().collect();
        events.sort_unstable();
        Self {
            events,
            today: None,
        }
    }

    /// Pin the source clock to a fixed date
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// Build a source from raw timestamp strings
    pub fn from_timestamps<I, S>(timestamps: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let events = timestamps
            .into_iter()
            .map(|raw| parse_event_date(raw.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(events))
    }

    /// Load a JSON array of records, reading the timestamp at `field`
    pub fn from_json_reader<R: Read>(reader: R, field: &str) -> Result<Self> {
        let records: Vec<Value> = serde_json::from_reader(reader)?;
        let timestamps = records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                record.get(field).and_then(Value::as_str).ok_or_else(|| {
                    ForecastError::InvalidParameter(format!(
                        "Record {} has no string field {:?}",
                        i, field
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_timestamps(timestamps)
    }

    /// Load a JSON export from disk
    pub fn from_json_file<P: AsRef<Path>>(path: P, field: &str) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_json_reader(BufReader::new(file), field)
    }

    /// Load CSV records whose header names the timestamp column `field`
    pub fn from_csv_reader<R: Read>(reader: R, field: &str) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let column = reader
            .headers()?
            .iter()
            .position(|name| name == field)
            .ok_or_else(|| {
                ForecastError::InvalidParameter(format!("CSV has no {:?} column", field))
            })?;

        let mut events = Vec::new();
        for record in reader.records() {
            let record = record?;
            let raw = record.get(column).ok_or_else(|| {
                ForecastError::InvalidParameter(format!("Short CSV record: {:?}", record))
            })?;
            events.push(parse_event_date(raw)?);
        }
        Ok(Self::new(events))
    }

    /// Load a CSV file from disk
    pub fn from_csv_file<P: AsRef<Path>>(path: P, field: &str) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_csv_reader(BufReader::new(file), field)
    }

    /// Load a file, choosing the format from its extension
    pub fn from_path<P: AsRef<Path>>(path: P, field: &str) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Self::from_csv_file(path, field),
            _ => Self::from_json_file(path, field),
        }
    }

    /// Number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Current date of the source clock
    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }

    fn counts(&self, granularity: Granularity, since: Option<NaiveDate>) -> BTreeMap<CalendarKey, u64> {
        let mut counts = BTreeMap::new();
        for &date in &self.events {
            if since.map_or(true, |start| date >= start) {
                *counts
                    .entry(CalendarKey::containing(granularity, date))
                    .or_insert(0) += 1;
            }
        }
        counts
    }
}

impl CountSource for EventLogSource {
    fn fetch(&self, range: SeriesRange, zero_fill: bool) -> Result<GrowthSeries> {
        if self.events.is_empty() {
            return Err(ForecastError::DataUnavailable(
                "Event log holds no records".to_string(),
            ));
        }

        let granularity = range.granularity;
        let current = CalendarKey::containing(granularity, self.today());

        let since = match (range.last_periods, zero_fill) {
            (Some(n), false) => Some(
                periods_back(granularity, current.start(), n.saturating_sub(1)).ok_or_else(
                    || ForecastError::InvalidParameter(format!("Cannot go back {} periods", n)),
                )?,
            ),
            _ => None,
        };
        let counts = self.counts(granularity, since);

        let mut series = GrowthSeries::default();
        if zero_fill {
            let Some(mut key) = counts.keys().next().copied() else {
                return Err(ForecastError::DataUnavailable(
                    "No events in the requested range".to_string(),
                ));
            };
            let last = counts
                .keys()
                .next_back()
                .copied()
                .map_or(current, |k| k.max(current));

            let mut total = 0;
            loop {
                let count = counts.get(&key).copied().unwrap_or(0);
                total += count;
                series.growth.insert(key, count)?;
                series.cumulative_growth.insert(key, total)?;
                if key >= last {
                    break;
                }
                key = key.next()?;
            }

            if let Some(n) = range.last_periods {
                series.growth = series.growth.tail(n as usize);
                series.cumulative_growth = series.cumulative_growth.tail(n as usize);
            }
        } else {
            let mut total = 0;
            for (key, count) in counts {
                total += count;
                series.growth.insert(key, count)?;
                series.cumulative_growth.insert(key, total)?;
            }
        }

        tracing::debug!(
            granularity = ?granularity,
            zero_fill,
            periods = series.growth.len(),
            "Aggregated event log"
        );
        Ok(series)
    }
}

/// The descriptive sources available to the core, one per [`SourceKind`]
#[derive(Clone)]
pub struct SourceSet {
    customers: Arc<dyn CountSource>,
    orders: Arc<dyn CountSource>,
}

impl SourceSet {
    /// Create a set from the two sources
    pub fn new(customers: Arc<dyn CountSource>, orders: Arc<dyn CountSource>) -> Self {
        Self { customers, orders }
    }

    /// Source feeding `kind`
    pub fn get(&self, kind: SourceKind) -> &Arc<dyn CountSource> {
        match kind {
            SourceKind::Customers => &self.customers,
            SourceKind::Orders => &self.orders,
        }
    }
}

impl std::fmt::Debug for SourceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceSet").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_event_date_formats() {
        assert_eq!(parse_event_date("2024-03-01T10:20:30.123").unwrap(), date(2024, 3, 1));
        assert_eq!(parse_event_date("2024-03-01T23:30:00Z").unwrap(), date(2024, 3, 1));
        assert_eq!(parse_event_date("2024-03-01").unwrap(), date(2024, 3, 1));
        assert!(parse_event_date("01/03/2024").is_err());
    }

    #[test]
    fn test_periods_back() {
        assert_eq!(periods_back(Granularity::Day, date(2024, 3, 1), 1), Some(date(2024, 2, 29)));
        assert_eq!(periods_back(Granularity::Month, date(2024, 1, 1), 2), Some(date(2023, 11, 1)));
        assert_eq!(periods_back(Granularity::Year, date(2024, 1, 1), 3), Some(date(2021, 1, 1)));
    }

    #[test]
    fn test_empty_log_is_unavailable() {
        let source = EventLogSource::new(Vec::new());
        let result = source.fetch(SeriesRange::all(Granularity::Day), true);
        assert!(matches!(result, Err(ForecastError::DataUnavailable(_))));
    }
}
