//! Calendar-labelled forecasts from the best registered model

use crate::data::SeriesRange;
use crate::error::{ForecastError, Result};
use crate::features::FeatureEngineer;
use crate::horizon::{Domain, ForecastLabel, Horizon, HyperparamTable};
use crate::models::SequenceModel;
use crate::registry::{ModelRegistry, RunKey};
use crate::sequence::Sequencer;
use crate::source::SourceSet;
use crate::split::inverse_transform_target;
use chrono::{NaiveDate, Utc};
use serde_json::{json, Map, Value};

/// Chart type reported with every forecast
pub const TYPE_OF_GRAPH: &str = "line";

/// Forecast values of one horizon, in calendar order
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastResult {
    horizon: Horizon,
    points: Vec<(ForecastLabel, f64)>,
}

impl ForecastResult {
    /// Pair labels with values; both must have the horizon's length
    pub fn new(horizon: Horizon, labels: Vec<ForecastLabel>, values: Vec<f64>) -> Result<Self> {
        if labels.len() != horizon.steps() || values.len() != horizon.steps() {
            return Err(ForecastError::InvalidParameter(format!(
                "{} expects {} values, got {} labels and {} values",
                horizon,
                horizon.steps(),
                labels.len(),
                values.len()
            )));
        }
        Ok(Self {
            horizon,
            points: labels.into_iter().zip(values).collect(),
        })
    }

    /// Horizon of the forecast
    pub fn horizon(&self) -> Horizon {
        self.horizon
    }

    /// `(label, value)` pairs
    pub fn points(&self) -> &[(ForecastLabel, f64)] {
        &self.points
    }

    /// Forecast values
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|(_, v)| *v).collect()
    }

    /// Number of values
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the forecast is empty
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// `{"predictions": {label: value}, "typeofgraph": "line"}`
    pub fn to_json(&self) -> Value {
        let predictions: Map<String, Value> = self
            .points
            .iter()
            .map(|(label, value)| (label.to_string(), json!(value)))
            .collect();
        json!({
            "predictions": predictions,
            "typeofgraph": TYPE_OF_GRAPH,
        })
    }
}

/// Serves forecasts for every domain and horizon
#[derive(Debug, Clone)]
pub struct DataPredictor {
    sources: SourceSet,
    registry: ModelRegistry,
    hyperparams: HyperparamTable,
}

impl DataPredictor {
    /// Create a predictor
    pub fn new(sources: SourceSet, registry: ModelRegistry, hyperparams: HyperparamTable) -> Self {
        Self {
            sources,
            registry,
            hyperparams,
        }
    }

    /// Forecast relative to the current UTC date
    pub fn predict(&self, domain: Domain, horizon: Horizon) -> Result<ForecastResult> {
        self.predict_on(domain, horizon, Utc::now().date_naive())
    }

    /// Forecast with labels relative to `today`
    ///
    /// Every failure is reported as [`ForecastError::PredictionFailed`]
    /// wrapping its cause.
    pub fn predict_on(
        &self,
        domain: Domain,
        horizon: Horizon,
        today: NaiveDate,
    ) -> Result<ForecastResult> {
        self.forecast(domain, horizon, today).map_err(|err| {
            tracing::warn!(domain = %domain, horizon = %horizon, error = %err, "Prediction failed");
            ForecastError::prediction_failed(err)
        })
    }

    fn forecast(&self, domain: Domain, horizon: Horizon, today: NaiveDate) -> Result<ForecastResult> {
        let hp = self.hyperparams.get(horizon);
        let run = self.registry.find_best_for(&RunKey::new(domain, hp))?;
        let artifacts = self.registry.load_artifacts(&run.run_id)?;

        let periods = u32::try_from(hp.history_periods()).map_err(|_| {
            ForecastError::InvalidParameter(format!("History of {:?} is too long", hp))
        })?;
        let history = self
            .sources
            .get(domain.source())
            .fetch(SeriesRange::last(horizon.granularity(), periods), true)?
            .into_series(domain.series());

        let table = FeatureEngineer::new(hp)?.build(&history)?;
        let x = artifacts.scaler_x.transform(table.features()?.view())?;
        let windows = Sequencer::new(hp.sequence_length).trailing(x.view(), horizon.steps())?;

        let scaled = artifacts.model.predict(windows.view())?;
        let values = inverse_transform_target(&artifacts.scaler_y, scaled.view())?;

        let result = ForecastResult::new(horizon, horizon.labels(today)?, values.to_vec())?;
        tracing::debug!(
            domain = %domain,
            horizon = %horizon,
            run_id = %run.run_id,
            values = ?result.values(),
            "Forecast served"
        );
        Ok(result)
    }
}
