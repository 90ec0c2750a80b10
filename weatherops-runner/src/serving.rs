//! Forecast serving over the persisted cleaned table and model.
//!
//! Reads never take the store lock; a request may see the artifacts of the
//! previous pipeline run while a new one is in flight.

use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

use weatherops_core::data::DataError;
use weatherops_core::model::{load_model, ArtifactError, TrainedModel};
use weatherops_core::{
    manual_forecast, CleanedTable, Forecast, ForecastError, ForecastStep, ManualForecast,
    RecursiveForecaster,
};

use crate::config::WeatherOpsConfig;
use crate::observer::{PipelineEvent, PipelineObserver, PredictionKind};

/// Longest horizon a single request may ask for.
pub const MAX_HORIZON_DAYS: usize = 30;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("forecast horizon must be between 1 and {max} days, got {days}")]
    InvalidHorizon { days: usize, max: usize },

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Forecast(#[from] ForecastError),
}

pub struct ForecastService {
    config: WeatherOpsConfig,
    observer: Arc<dyn PipelineObserver>,
}

impl ForecastService {
    pub fn new(config: WeatherOpsConfig, observer: Arc<dyn PipelineObserver>) -> Self {
        Self { config, observer }
    }

    /// Load the current snapshot of the cleaned table and the model.
    pub fn load(&self) -> Result<(CleanedTable, TrainedModel), ServeError> {
        let cleaned_path = &self.config.paths.cleaned_table;
        if !cleaned_path.is_file() {
            return Err(ArtifactError::Missing {
                path: cleaned_path.clone(),
            }
            .into());
        }
        let table = CleanedTable::load(cleaned_path)?;
        let model = load_model(&self.config.paths.model)?;

        // Inference rebuilds features from the model's own lag spec, so a
        // drifted config only warrants a warning.
        let spec = self.config.lag_spec();
        if !model.matches_config(&spec, &self.config.features.target) {
            warn!(
                model_lags = model.lags,
                config_lags = spec.lags,
                "model was trained with a different feature configuration; retrain to apply it"
            );
        }
        Ok((table, model))
    }

    pub fn next_day(&self) -> Result<ForecastStep, ServeError> {
        let started = Instant::now();
        let (table, model) = self.load()?;
        let forecast = RecursiveForecaster::forecast(&table, &model, 1)?;
        self.served(PredictionKind::NextDay, 1, started);
        forecast
            .steps
            .into_iter()
            .next()
            .ok_or(ServeError::InvalidHorizon { days: 0, max: MAX_HORIZON_DAYS })
    }

    /// Recursive forecast for the next `days` days.
    pub fn forecast(&self, days: usize) -> Result<Forecast, ServeError> {
        if days == 0 || days > MAX_HORIZON_DAYS {
            return Err(ServeError::InvalidHorizon {
                days,
                max: MAX_HORIZON_DAYS,
            });
        }
        let started = Instant::now();
        let (table, model) = self.load()?;
        let forecast = RecursiveForecaster::forecast(&table, &model, days)?;
        self.served(PredictionKind::Horizon, days, started);
        Ok(forecast)
    }

    /// Best-effort forecast from manually entered recent target values,
    /// oldest first.
    pub fn manual(&self, recent: &[f64]) -> Result<ManualForecast, ServeError> {
        let started = Instant::now();
        let (table, model) = self.load()?;
        let result = manual_forecast(&table, &model, recent)?;
        if !result.filled.is_empty() {
            debug!(filled = ?result.filled, "filled unsupplied features from history");
        }
        self.served(PredictionKind::Manual, 1, started);
        Ok(result)
    }

    fn served(&self, kind: PredictionKind, days: usize, started: Instant) {
        self.observer.on_event(&PipelineEvent::PredictionServed {
            kind,
            days,
            latency: started.elapsed(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::InMemoryObserver;

    #[test]
    fn missing_artifacts_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = WeatherOpsConfig::default().with_root(dir.path());
        let service = ForecastService::new(config.clone(), Arc::new(InMemoryObserver::new()));
        match service.next_day() {
            Err(ServeError::Artifact(ArtifactError::Missing { path })) => {
                assert_eq!(path, config.paths.cleaned_table)
            }
            other => panic!("expected missing artifact, got {other:?}"),
        }
    }

    #[test]
    fn horizon_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let config = WeatherOpsConfig::default().with_root(dir.path());
        let service = ForecastService::new(config, Arc::new(InMemoryObserver::new()));
        assert!(matches!(
            service.forecast(0),
            Err(ServeError::InvalidHorizon { days: 0, .. })
        ));
        assert!(matches!(
            service.forecast(MAX_HORIZON_DAYS + 1),
            Err(ServeError::InvalidHorizon { .. })
        ));
    }
}
