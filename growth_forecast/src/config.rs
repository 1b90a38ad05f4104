//! Service configuration loaded from a JSON file
//!
//! Every field has a default, so an empty object `{}` is a valid
//! configuration. The binary layers command-line flags and environment
//! variables on top of the file.

use crate::error::{ForecastError, Result};
use crate::horizon::HyperparamTable;
use crate::registry::RegistryConfig;
use crate::source::{EventLogSource, SourceSet};
use crate::split::DEFAULT_TEST_FRACTION;
use crate::training::TrainingGrid;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Default time between optimization cycles
pub const DEFAULT_SCHEDULE_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// An event export and the record field holding each event timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFileConfig {
    /// JSON or CSV file; `.csv` selects the CSV reader
    pub path: Option<PathBuf>,
    pub timestamp_field: String,
}

impl EventFileConfig {
    fn with_field(field: &str) -> Self {
        Self {
            path: None,
            timestamp_field: field.to_string(),
        }
    }

    /// Load the event log
    pub fn load(&self, name: &str) -> Result<EventLogSource> {
        let path = self.path.as_ref().ok_or_else(|| {
            ForecastError::InvalidParameter(format!("No event file configured for {}", name))
        })?;
        let source = EventLogSource::from_path(path, &self.timestamp_field)?;
        tracing::info!(source = name, path = %path.display(), events = source.len(), "Loaded event log");
        Ok(source)
    }
}

/// Event files feeding the two descriptive sources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub customers: EventFileConfig,
    pub orders: EventFileConfig,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            customers: EventFileConfig::with_field("signedUp"),
            orders: EventFileConfig::with_field("orderDate"),
        }
    }
}

impl SourcesConfig {
    /// Load both event logs
    pub fn load(&self) -> Result<SourceSet> {
        Ok(SourceSet::new(
            Arc::new(self.customers.load("customers")?),
            Arc::new(self.orders.load("orders")?),
        ))
    }
}

/// Top-level configuration of the forecasting service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub registry: RegistryConfig,
    /// Per-horizon overrides of the feature hyperparameters
    pub hyperparams: HyperparamTable,
    pub grid: TrainingGrid,
    /// Share of feature rows held out for validation
    pub test_fraction: f64,
    pub schedule_interval_secs: u64,
    pub sources: SourcesConfig,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            registry: RegistryConfig::default(),
            hyperparams: HyperparamTable::default(),
            grid: TrainingGrid::default(),
            test_fraction: DEFAULT_TEST_FRACTION,
            schedule_interval_secs: DEFAULT_SCHEDULE_INTERVAL_SECS,
            sources: SourcesConfig::default(),
        }
    }
}

impl ForecastConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    /// Check every section
    pub fn validate(&self) -> Result<()> {
        self.hyperparams.validate()?;
        self.grid.validate()?;
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        if self.schedule_interval_secs == 0 {
            return Err(ForecastError::InvalidParameter(
                "schedule_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Time between optimization cycles
    pub fn schedule_interval(&self) -> Duration {
        Duration::from_secs(self.schedule_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::horizon::Horizon;

    #[test]
    fn test_empty_object_is_default() {
        let config = ForecastConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ForecastConfig::default());
        assert_eq!(config.registry.experiment, "GrowthEx");
        assert_eq!(config.sources.orders.timestamp_field, "orderDate");
        assert_eq!(config.schedule_interval(), Duration::from_secs(86_400));
    }

    #[test]
    fn test_partial_override() {
        let config = ForecastConfig::from_json_str(
            r#"{
                "registry": {"tracking_uri": "file:///tmp/runs"},
                "hyperparams": {"month": {"lag": 1, "rolling_mean": 1, "sequence_length": 1}},
                "grid": {"num_units": [8, 16]},
                "test_fraction": 0.25
            }"#,
        )
        .unwrap();
        assert_eq!(config.registry.root_path(), PathBuf::from("/tmp/runs"));
        assert_eq!(config.registry.experiment, "GrowthEx");
        assert_eq!(config.hyperparams.get(Horizon::Month).lag, 1);
        assert_eq!(config.grid.len(), 2);
        assert_eq!(config.grid.batch_size, 32);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(ForecastConfig::from_json_str(r#"{"test_fraction": 1.5}"#).is_err());
        assert!(ForecastConfig::from_json_str(r#"{"grid": {"epochs": []}}"#).is_err());
        assert!(ForecastConfig::from_json_str(r#"{"schedule_interval_secs": 0}"#).is_err());
    }
}
