//! Recursive multi-day forecasting.
//!
//! Each day is predicted from a query row for the next date: its lag columns
//! come from the working history and its same-day non-target values are
//! carried forward from the most recent row. The prediction then becomes the
//! target value of a synthetic row appended to the working history, so day
//! `d + 1` sees day `d`'s prediction as its lag-1 input. The caller's table is
//! never modified.

use chrono::NaiveDate;
use polars::prelude::PolarsError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use crate::data::{DataError, SchemaError};
use crate::describe::WeatherDescription;
use crate::domain::{PRECIPITATION, WIND_SPEED};
use crate::features::{lag_column_name, parse_lag_column, FeatureBuilder, FeatureError};
use crate::model::{TrainedModel, TrainingError};
use crate::table::CleanedTable;
use crate::validate::{align_row, validate, ValidationMode};

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("forecast needs at least {required} rows of history, got {rows}")]
    InsufficientHistory { rows: usize, required: usize },

    #[error("model target '{0}' is not a column of the history")]
    MissingTarget(String),

    #[error("no calendar date follows {0}")]
    DateOverflow(NaiveDate),

    #[error("manual forecast needs at least one recent value")]
    EmptyInput,

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    Training(#[from] TrainingError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Frame(#[from] PolarsError),
}

/// One forecast day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastStep {
    /// 1-based horizon index.
    pub day: usize,
    pub date: NaiveDate,
    pub value: f64,
    /// Carried-forward precipitation for the synthetic day (0 when untracked).
    pub precipitation: f64,
    /// Carried-forward wind speed for the synthetic day (0 when untracked).
    pub wind_speed: f64,
    pub description: WeatherDescription,
    /// Model inputs, by feature name.
    pub inputs: BTreeMap<String, f64>,
}

impl ForecastStep {
    /// Prediction rounded to two decimals for display.
    pub fn rounded(&self) -> f64 {
        (self.value * 100.0).round() / 100.0
    }
}

#[derive(Debug, Clone)]
pub struct Forecast {
    pub steps: Vec<ForecastStep>,
    /// Column the model predicts.
    pub target: String,
    working: CleanedTable,
}

impl Forecast {
    /// History plus one synthetic row per forecast day.
    pub fn working_table(&self) -> &CleanedTable {
        &self.working
    }

    pub fn values(&self) -> Vec<f64> {
        self.steps.iter().map(|s| s.value).collect()
    }
}

pub struct RecursiveForecaster;

impl RecursiveForecaster {
    /// Predict `horizon` days past the end of `table`.
    ///
    /// Requires at least `lags` rows of history.
    pub fn forecast(
        table: &CleanedTable,
        model: &TrainedModel,
        horizon: usize,
    ) -> Result<Forecast, ForecastError> {
        let spec = model.lag_spec();
        if table.height() < spec.lags {
            return Err(ForecastError::InsufficientHistory {
                rows: table.height(),
                required: spec.lags,
            });
        }
        if !table.has_column(&model.target) {
            return Err(ForecastError::MissingTarget(model.target.clone()));
        }

        let mut working = table.clone();
        let mut steps = Vec::with_capacity(horizon);
        for day in 1..=horizon {
            let Some((last_date, carried)) = working.last_row()? else {
                return Err(ForecastError::InsufficientHistory {
                    rows: 0,
                    required: spec.lags,
                });
            };
            let date = last_date
                .succ_opt()
                .ok_or(ForecastError::DateOverflow(last_date))?;
            let carry = |name: &str| carried.get(name).copied().flatten();

            let mut query = working.tail(spec.lags);
            query.push_row(date, carry)?;
            let matrix = FeatureBuilder::build(&query, &spec)?;
            let names = validate(&model.feature_names, &matrix.columns())?;
            let Some(last) = matrix.height().checked_sub(1) else {
                return Err(ForecastError::InsufficientHistory {
                    rows: working.height(),
                    required: spec.lags,
                });
            };
            let inputs = matrix.row(&names, last)?;
            let value = model.predict(&inputs)?;

            working.push_row(date, |name| {
                if name == model.target {
                    Some(value)
                } else {
                    carry(name)
                }
            })?;

            let precipitation = carry(PRECIPITATION).unwrap_or(0.0);
            let wind_speed = carry(WIND_SPEED).unwrap_or(0.0);
            steps.push(ForecastStep {
                day,
                date,
                value,
                precipitation,
                wind_speed,
                description: WeatherDescription::classify(value, precipitation, wind_speed),
                inputs: names.into_iter().zip(inputs).collect(),
            });
        }

        Ok(Forecast {
            steps,
            target: model.target.clone(),
            working,
        })
    }
}

/// Result of a forecast from manually entered recent values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualForecast {
    pub value: f64,
    pub description: WeatherDescription,
    /// Model features that were not supplied and were filled from history.
    pub filled: Vec<String>,
}

/// Best-effort prediction from recent target values, oldest first.
///
/// `recent[len - k]` becomes `{target}_t-k`. Every other model feature is
/// filled with the column median of `table`, then the median of its base
/// column, then `0.0`. Values older than the model's lag window are ignored.
/// The description is classified from the predicted temperature only.
pub fn manual_forecast(
    table: &CleanedTable,
    model: &TrainedModel,
    recent: &[f64],
) -> Result<ManualForecast, ForecastError> {
    if recent.is_empty() {
        return Err(ForecastError::EmptyInput);
    }
    let supplied: HashMap<String, f64> = recent
        .iter()
        .rev()
        .enumerate()
        .map(|(i, v)| (lag_column_name(&model.target, i + 1), *v))
        .collect();

    let aligned = align_row(&model.feature_names, &supplied, ValidationMode::BestEffort, |name| {
        table
            .median(name)
            .or_else(|| parse_lag_column(name).and_then(|(base, _)| table.median(base)))
    })?;
    let value = model.predict(&aligned.values)?;

    // Filled-in rain and wind are history medians, not readings for the
    // forecast day, so the description goes by temperature alone.
    Ok(ManualForecast {
        value,
        description: WeatherDescription::classify(value, 0.0, 0.0),
        filled: aligned.filled,
    })
}
