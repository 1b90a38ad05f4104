//! Forecast domains, horizons and their feature hyperparameters

use crate::data::{CalendarKey, Granularity, SeriesKind};
use crate::error::{ForecastError, Result};
use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Which descriptive source feeds a domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Customer signups
    Customers,
    /// Placed orders
    Orders,
}

/// A forecast target: one source and one of its two series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Domain {
    CustomerGrowth,
    CumulativeCustomerGrowth,
    OrdersGrowth,
    CumulativeOrdersGrowth,
}

impl Domain {
    /// Every tracked domain
    pub const ALL: [Domain; 4] = [
        Domain::CustomerGrowth,
        Domain::CumulativeCustomerGrowth,
        Domain::OrdersGrowth,
        Domain::CumulativeOrdersGrowth,
    ];

    /// Registry run name
    pub fn run_name(self) -> &'static str {
        match self {
            Domain::CustomerGrowth => "CustomerGrowth",
            Domain::CumulativeCustomerGrowth => "CumulativeCustomerGrowth",
            Domain::OrdersGrowth => "OrdersGrowth",
            Domain::CumulativeOrdersGrowth => "CumulativeOrdersGrowth",
        }
    }

    /// Source the domain reads from
    pub fn source(self) -> SourceKind {
        match self {
            Domain::CustomerGrowth | Domain::CumulativeCustomerGrowth => SourceKind::Customers,
            Domain::OrdersGrowth | Domain::CumulativeOrdersGrowth => SourceKind::Orders,
        }
    }

    /// Series the domain forecasts
    pub fn series(self) -> SeriesKind {
        match self {
            Domain::CustomerGrowth | Domain::OrdersGrowth => SeriesKind::Growth,
            Domain::CumulativeCustomerGrowth | Domain::CumulativeOrdersGrowth => {
                SeriesKind::Cumulative
            }
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.run_name())
    }
}

impl FromStr for Domain {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        Domain::ALL
            .into_iter()
            .find(|d| d.run_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ForecastError::InvalidParameter(format!("Unknown domain: {}", s)))
    }
}

/// Feature and window sizes of one model variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HyperparamConfig {
    /// Number of lag columns
    pub lag: usize,
    /// Width of the rolling mean window
    pub rolling_mean: usize,
    /// Rows per model input window
    pub sequence_length: usize,
}

impl HyperparamConfig {
    /// Create a validated configuration
    pub fn new(lag: usize, rolling_mean: usize, sequence_length: usize) -> Result<Self> {
        let config = Self {
            lag,
            rolling_mean,
            sequence_length,
        };
        config.validate()?;
        Ok(config)
    }

    /// Every size must be positive
    pub fn validate(&self) -> Result<()> {
        if self.lag == 0 || self.rolling_mean == 0 || self.sequence_length == 0 {
            return Err(ForecastError::InvalidParameter(format!(
                "Hyperparameters must be positive: {:?}",
                self
            )));
        }
        Ok(())
    }

    /// Rows dropped at the head of a series by feature engineering
    pub fn warmup(&self) -> usize {
        self.lag.max(self.rolling_mean)
    }

    /// Periods of history the predictor fetches
    pub fn history_periods(&self) -> usize {
        2 * self.sequence_length + self.warmup() + self.rolling_mean
    }
}

/// Forecast distance and granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Horizon {
    /// Tomorrow
    OneDay,
    /// Each of the next seven days
    SevenDays,
    /// The current month
    Month,
    /// The current year
    Year,
}

impl Horizon {
    /// Every supported horizon
    pub const ALL: [Horizon; 4] = [
        Horizon::OneDay,
        Horizon::SevenDays,
        Horizon::Month,
        Horizon::Year,
    ];

    /// Configuration name
    pub fn name(self) -> &'static str {
        match self {
            Horizon::OneDay => "one_day",
            Horizon::SevenDays => "seven_days",
            Horizon::Month => "month",
            Horizon::Year => "year",
        }
    }

    /// Built-in feature hyperparameters
    pub fn default_hyperparams(self) -> HyperparamConfig {
        let (lag, rolling_mean, sequence_length) = match self {
            Horizon::OneDay => (2, 3, 5),
            Horizon::SevenDays => (3, 7, 7),
            Horizon::Month => (2, 3, 2),
            Horizon::Year => (1, 2, 1),
        };
        HyperparamConfig {
            lag,
            rolling_mean,
            sequence_length,
        }
    }

    /// Resolution of the series the horizon is trained on
    pub fn granularity(self) -> Granularity {
        match self {
            Horizon::OneDay | Horizon::SevenDays => Granularity::Day,
            Horizon::Month => Granularity::Month,
            Horizon::Year => Granularity::Year,
        }
    }

    /// Number of values a forecast holds
    pub fn steps(self) -> usize {
        match self {
            Horizon::SevenDays => 7,
            Horizon::OneDay | Horizon::Month | Horizon::Year => 1,
        }
    }

    /// Calendar labels of the forecast values, relative to `today`
    pub fn labels(self, today: NaiveDate) -> Result<Vec<ForecastLabel>> {
        match self {
            Horizon::OneDay | Horizon::SevenDays => (1..=self.steps() as u64)
                .map(|offset| {
                    today
                        .checked_add_days(Days::new(offset))
                        .map(ForecastLabel::Date)
                        .ok_or_else(|| {
                            ForecastError::InvalidParameter(format!(
                                "Date overflow after {}",
                                today
                            ))
                        })
                })
                .collect(),
            Horizon::Month => Ok(vec![ForecastLabel::Month(CalendarKey::month(
                today.year(),
                today.month(),
            )?)]),
            Horizon::Year => Ok(vec![ForecastLabel::Year(today.year())]),
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Horizon {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        Horizon::ALL
            .into_iter()
            .find(|h| h.name() == s)
            .ok_or_else(|| ForecastError::InvalidParameter(format!("Unknown horizon: {}", s)))
    }
}

/// Calendar label of one forecast value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ForecastLabel {
    /// A day, `YYYY-MM-DD`
    Date(NaiveDate),
    /// A month, `YYYY-MM`
    Month(CalendarKey),
    /// A year
    Year(i32),
}

impl fmt::Display for ForecastLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForecastLabel::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            ForecastLabel::Month(key) => write!(f, "{}", key),
            ForecastLabel::Year(year) => write!(f, "{}", year),
        }
    }
}

/// Per-horizon hyperparameters, defaulting to the built-in table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HyperparamTable {
    overrides: BTreeMap<Horizon, HyperparamConfig>,
}

impl HyperparamTable {
    /// Replace the configuration of one horizon
    pub fn with_override(mut self, horizon: Horizon, config: HyperparamConfig) -> Result<Self> {
        config.validate()?;
        self.overrides.insert(horizon, config);
        Ok(self)
    }

    /// Configuration in force for `horizon`
    pub fn get(&self, horizon: Horizon) -> HyperparamConfig {
        self.overrides
            .get(&horizon)
            .copied()
            .unwrap_or_else(|| horizon.default_hyperparams())
    }

    /// Check every override
    pub fn validate(&self) -> Result<()> {
        self.overrides.values().try_for_each(|c| c.validate())
    }
}
