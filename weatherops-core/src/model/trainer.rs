//! Model fitting and evaluation over a feature matrix.
//!
//! Rows are split by position: the first `1 - test_fraction` of the matrix
//! trains, the remainder tests. Time order is preserved and nothing is ever
//! shuffled, so no future row leaks into the training set.

use chrono::{NaiveDateTime, Utc};
use polars::prelude::PolarsError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::regressor::{ModelKind, Predictor, Regressor};
use crate::data::SchemaError;
use crate::features::{lag_column_name, FeatureError, FeatureMatrix, LagSpec};
use crate::fingerprint::{dataset_hash, feature_config_hash, DatasetHash, FeatureConfigHash};
use crate::validate::validate;

/// Current on-disk model artifact version.
pub const MODEL_FORMAT_VERSION: u32 = 1;

/// Smallest number of rows allowed in either split.
pub const MIN_SPLIT_ROWS: usize = 2;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("feature matrix has {rows} rows ({train} train / {test} test); each split needs at least 2")]
    InsufficientRows { rows: usize, train: usize, test: usize },

    #[error("test fraction must be strictly between 0 and 1, got {0}")]
    InvalidSplit(f64),

    #[error("target column '{0}' is not in the feature matrix")]
    MissingTarget(String),

    #[error("predictor requires feature '{0}'")]
    MissingFeature(String),

    #[error("no feature columns to fit on")]
    NoFeatures,

    #[error("expected {expected} values, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("invalid model parameter: {0}")]
    InvalidParameter(String),

    #[error("normal equations are singular")]
    Singular,

    #[error("predictor has not been fitted")]
    NotFitted,

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    Frame(#[from] PolarsError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    pub target: String,
    pub test_fraction: f64,
    pub model: ModelKind,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            target: crate::domain::AVG_TEMP.to_string(),
            test_fraction: 0.2,
            model: ModelKind::default(),
        }
    }
}

/// Evaluation over the held-out split. Errors are rounded to two decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub mae: f64,
    pub rmse: f64,
    pub feature_count: usize,
    pub training_sample_count: usize,
    pub test_sample_count: usize,
    pub model: String,
    pub trained_at: NaiveDateTime,
}

/// A fitted predictor bound to the exact ordered feature list it was fit on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    pub format_version: u32,
    pub predictor: Predictor,
    pub feature_names: Vec<String>,
    pub target: String,
    pub base_features: Vec<String>,
    pub lags: usize,
    pub feature_config_hash: FeatureConfigHash,
    pub dataset_hash: DatasetHash,
    pub trained_at: NaiveDateTime,
    pub metrics: Metrics,
}

impl TrainedModel {
    /// The lag configuration features must be rebuilt with at inference.
    pub fn lag_spec(&self) -> LagSpec {
        LagSpec::new(self.base_features.clone(), self.lags)
    }

    /// Predict from a row already in `feature_names` order.
    pub fn predict(&self, row: &[f64]) -> Result<f64, TrainingError> {
        if row.len() != self.feature_names.len() {
            return Err(TrainingError::DimensionMismatch {
                expected: self.feature_names.len(),
                got: row.len(),
            });
        }
        self.predictor.predict(row)
    }

    /// True when this model was built with the given lag configuration.
    pub fn matches_config(&self, spec: &LagSpec, target: &str) -> bool {
        self.feature_config_hash == feature_config_hash(spec, target)
    }
}

pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Fit on the leading rows of `matrix` and evaluate on the trailing rows.
    pub fn fit(&self, matrix: &FeatureMatrix) -> Result<(TrainedModel, Metrics), TrainingError> {
        let fraction = self.config.test_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(TrainingError::InvalidSplit(fraction));
        }
        let target = self.config.target.as_str();
        let columns = matrix.columns();
        if !columns.iter().any(|c| c == target) {
            return Err(TrainingError::MissingTarget(target.to_string()));
        }

        let (train, test) = split_sizes(matrix.height(), fraction);
        if train < MIN_SPLIT_ROWS || test < MIN_SPLIT_ROWS {
            return Err(TrainingError::InsufficientRows {
                rows: matrix.height(),
                train,
                test,
            });
        }

        // Recursive forecasting feeds each prediction back through the target's lags.
        let target_lags: Vec<String> = (1..=matrix.spec().lags)
            .map(|k| lag_column_name(target, k))
            .collect();
        validate(&target_lags, &columns)?;
        validate(&matrix.spec().lag_columns(), &columns)?;

        let feature_names = matrix.feature_columns(target);
        if feature_names.is_empty() {
            return Err(TrainingError::NoFeatures);
        }
        let x = matrix.design(&feature_names)?;
        let y = matrix.column_values(target)?;

        let mut predictor = self.config.model.build(target);
        predictor.fit(&feature_names, &x[..train], &y[..train])?;

        let mut abs_sum = 0.0;
        let mut sq_sum = 0.0;
        for (row, actual) in x[train..].iter().zip(&y[train..]) {
            let err = predictor.predict(row)? - actual;
            abs_sum += err.abs();
            sq_sum += err * err;
        }
        let trained_at = Utc::now().naive_utc();
        let metrics = Metrics {
            mae: round2(abs_sum / test as f64),
            rmse: round2((sq_sum / test as f64).sqrt()),
            feature_count: feature_names.len(),
            training_sample_count: train,
            test_sample_count: test,
            model: predictor.name().to_string(),
            trained_at,
        };

        let spec = matrix.spec().clone();
        let model = TrainedModel {
            format_version: MODEL_FORMAT_VERSION,
            predictor,
            feature_names,
            target: target.to_string(),
            feature_config_hash: feature_config_hash(&spec, target),
            dataset_hash: dataset_hash(matrix.frame()),
            base_features: spec.base_features,
            lags: spec.lags,
            trained_at,
            metrics: metrics.clone(),
        };
        Ok((model, metrics))
    }
}

/// `(train, test)` row counts; the test split is `ceil(fraction * rows)`.
pub fn split_sizes(rows: usize, test_fraction: f64) -> (usize, usize) {
    let test = ((rows as f64) * test_fraction).ceil() as usize;
    let test = test.min(rows);
    (rows - test, test)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
