//! Calendar-keyed count series produced by the descriptive sources

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Calendar resolution of a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// One entry per day, keyed `YYYY-MM-DD`
    Day,
    /// One entry per month, keyed `YYYY-MM`
    Month,
    /// One entry per year, keyed `YYYY`
    Year,
}

impl Granularity {
    /// Start of the period containing `date`
    pub fn period_start(self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Day => date,
            Granularity::Month => date.with_day(1).unwrap_or(date),
            Granularity::Year => date.with_ordinal(1).unwrap_or(date),
        }
    }
}

/// Start of a day, month or year period
///
/// Keys order by their period start, so a series of one granularity is
/// always chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CalendarKey {
    start: NaiveDate,
    granularity: Granularity,
}

impl CalendarKey {
    /// Key of the period of `granularity` containing `date`
    pub fn containing(granularity: Granularity, date: NaiveDate) -> Self {
        Self {
            start: granularity.period_start(date),
            granularity,
        }
    }

    /// Day key
    pub fn day(date: NaiveDate) -> Self {
        Self::containing(Granularity::Day, date)
    }

    /// Month key
    pub fn month(year: i32, month: u32) -> Result<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
            ForecastError::InvalidParameter(format!("Invalid month {}-{:02}", year, month))
        })?;
        Ok(Self::containing(Granularity::Month, start))
    }

    /// Year key
    pub fn year(year: i32) -> Result<Self> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1)
            .ok_or_else(|| ForecastError::InvalidParameter(format!("Invalid year {}", year)))?;
        Ok(Self::containing(Granularity::Year, start))
    }

    /// First day of the period
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Resolution of the key
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Seconds since the epoch of midnight UTC at the period start
    pub fn timestamp(&self) -> i64 {
        let midnight = self.start.and_hms_opt(0, 0, 0).unwrap_or_default();
        DateTime::<Utc>::from_naive_utc_and_offset(midnight, Utc).timestamp()
    }

    /// The following period
    pub fn next(&self) -> Result<Self> {
        let start = match self.granularity {
            Granularity::Day => self.start.succ_opt(),
            Granularity::Month => self.start.checked_add_months(Months::new(1)),
            Granularity::Year => NaiveDate::from_ymd_opt(self.start.year() + 1, 1, 1),
        }
        .ok_or_else(|| ForecastError::InvalidParameter(format!("No period after {}", self)))?;

        Ok(Self {
            start,
            granularity: self.granularity,
        })
    }
}

impl fmt::Display for CalendarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.granularity {
            Granularity::Day => write!(f, "{}", self.start.format("%Y-%m-%d")),
            Granularity::Month => write!(f, "{}", self.start.format("%Y-%m")),
            Granularity::Year => write!(f, "{}", self.start.year()),
        }
    }
}

impl FromStr for CalendarKey {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ForecastError::InvalidParameter(format!("Unsupported date key: {:?}", s));
        let s = s.trim();

        match s.len() {
            10 => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(CalendarKey::day)
                .map_err(|_| invalid()),
            7 => NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d")
                .map(|date| CalendarKey::containing(Granularity::Month, date))
                .map_err(|_| invalid()),
            4 => {
                let year: i32 = s.parse().map_err(|_| invalid())?;
                CalendarKey::year(year)
            }
            _ => Err(invalid()),
        }
    }
}

/// Ordered calendar key to count mapping of one granularity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, u64>", into = "BTreeMap<String, u64>")]
pub struct CountSeries {
    points: BTreeMap<CalendarKey, u64>,
}

impl CountSeries {
    /// Create an empty series
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a series from `(key, count)` pairs given as strings
    ///
    /// # Examples
    ///
    /// ```
    /// use growth_forecast::data::CountSeries;
    ///
    /// let series = CountSeries::from_pairs([("2024-01-02", 3), ("2024-01-01", 1)]).unwrap();
    /// assert_eq!(series.values(), vec![1, 3]);
    /// ```
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, u64)>,
    {
        let mut series = Self::new();
        for (key, count) in pairs {
            series.insert(key.parse()?, count)?;
        }
        Ok(series)
    }

    /// Insert or replace a count; keys must share the series granularity
    pub fn insert(&mut self, key: CalendarKey, count: u64) -> Result<()> {
        if let Some(granularity) = self.granularity() {
            if granularity != key.granularity() {
                return Err(ForecastError::InvalidParameter(format!(
                    "Cannot mix {:?} key {} into a {:?} series",
                    key.granularity(),
                    key,
                    granularity
                )));
            }
        }
        self.points.insert(key, count);
        Ok(())
    }

    /// Granularity of the keys, `None` when empty
    pub fn granularity(&self) -> Option<Granularity> {
        self.points.keys().next().map(|k| k.granularity())
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the series is empty
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Keys in chronological order
    pub fn keys(&self) -> Vec<CalendarKey> {
        self.points.keys().copied().collect()
    }

    /// Counts in chronological order
    pub fn values(&self) -> Vec<u64> {
        self.points.values().copied().collect()
    }

    /// Count stored for `key`
    pub fn get(&self, key: &CalendarKey) -> Option<u64> {
        self.points.get(key).copied()
    }

    /// Iterate entries in chronological order
    pub fn iter(&self) -> impl Iterator<Item = (&CalendarKey, &u64)> {
        self.points.iter()
    }

    /// Last key of the series
    pub fn last_key(&self) -> Option<CalendarKey> {
        self.points.keys().next_back().copied()
    }

    /// True when no period between the first and last key is missing
    pub fn is_contiguous(&self) -> bool {
        let keys = self.keys();
        keys.windows(2)
            .all(|pair| matches!(pair[0].next(), Ok(next) if next == pair[1]))
    }

    /// Keep only the last `n` entries
    pub fn tail(&self, n: usize) -> Self {
        let skip = self.points.len().saturating_sub(n);
        Self {
            points: self.points.iter().skip(skip).map(|(k, v)| (*k, *v)).collect(),
        }
    }
}

impl TryFrom<BTreeMap<String, u64>> for CountSeries {
    type Error = ForecastError;

    fn try_from(map: BTreeMap<String, u64>) -> Result<Self> {
        Self::from_pairs(map.iter().map(|(k, v)| (k.as_str(), *v)))
    }
}

impl From<CountSeries> for BTreeMap<String, u64> {
    fn from(series: CountSeries) -> Self {
        series
            .points
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }
}

/// Which of the two series a domain forecasts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeriesKind {
    /// Events per period
    Growth,
    /// Running total of events
    Cumulative,
}

/// Per-period and running-total series returned by a descriptive source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrowthSeries {
    /// Events per period
    pub growth: CountSeries,
    /// Running total of events at each period
    pub cumulative_growth: CountSeries,
}

impl GrowthSeries {
    /// Select one of the two series
    pub fn series(&self, kind: SeriesKind) -> &CountSeries {
        match kind {
            SeriesKind::Growth => &self.growth,
            SeriesKind::Cumulative => &self.cumulative_growth,
        }
    }

    /// Take one of the two series by value
    pub fn into_series(self, kind: SeriesKind) -> CountSeries {
        match kind {
            SeriesKind::Growth => self.growth,
            SeriesKind::Cumulative => self.cumulative_growth,
        }
    }
}

/// Period resolution and extent requested from a descriptive source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesRange {
    /// Resolution of the returned keys
    pub granularity: Granularity,
    /// Restrict the series to the most recent periods
    pub last_periods: Option<u32>,
}

impl SeriesRange {
    /// The full history at `granularity`
    pub fn all(granularity: Granularity) -> Self {
        Self {
            granularity,
            last_periods: None,
        }
    }

    /// The last `periods` periods at `granularity`
    pub fn last(granularity: Granularity, periods: u32) -> Self {
        Self {
            granularity,
            last_periods: Some(periods),
        }
    }
}
