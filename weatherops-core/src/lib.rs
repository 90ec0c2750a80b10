//! WeatherOps Core: observation store, cleaning, lag features, training and
//! recursive forecasting for daily weather observations.
//!
//! Data flows leaves-first:
//! - Observations are ingested and merged into the store (`data`)
//! - The cleaner derives an analysis-ready table (`clean`, `table`)
//! - Lag features are built identically for training and inference (`features`)
//! - A predictor is trained and bound to its feature order (`model`)
//! - Forecasts feed predictions back as synthetic rows (`forecast`)

pub mod clean;
pub mod data;
pub mod describe;
pub mod domain;
pub mod features;
pub mod fingerprint;
pub mod forecast;
pub mod model;
pub mod table;
pub mod validate;

pub use clean::{CleanReport, Cleaner, DROPPED_COLUMNS};
pub use describe::WeatherDescription;
pub use features::{lag_column_name, FeatureBuilder, FeatureError, FeatureMatrix, LagSpec};
pub use forecast::{
    manual_forecast, Forecast, ForecastError, ForecastStep, ManualForecast, RecursiveForecaster,
};
pub use table::CleanedTable;
pub use validate::{align_row, validate, ValidationMode};
