//! Pluggable predictors consuming a fixed-order feature row.

use serde::{Deserialize, Serialize};

use super::persistence::PersistenceRegressor;
use super::ridge::RidgeRegressor;
use super::trainer::TrainingError;

/// A regression model over an ordered feature vector.
///
/// `fit` binds the model to `feature_names`; `predict` must receive values in
/// that same order. Implementations are deterministic.
pub trait Regressor: Send + Sync {
    /// Short identifier (e.g., "ridge").
    fn name(&self) -> &str;

    fn fit(&mut self, feature_names: &[String], x: &[Vec<f64>], y: &[f64]) -> Result<(), TrainingError>;

    fn predict(&self, row: &[f64]) -> Result<f64, TrainingError>;
}

/// Which predictor to train.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelKind {
    Ridge { alpha: f64 },
    Persistence,
}

impl Default for ModelKind {
    fn default() -> Self {
        Self::Ridge { alpha: 1.0 }
    }
}

impl ModelKind {
    /// An unfitted predictor of this kind for `target`.
    pub fn build(&self, target: &str) -> Predictor {
        match self {
            Self::Ridge { alpha } => Predictor::Ridge(RidgeRegressor::new(*alpha)),
            Self::Persistence => Predictor::Persistence(PersistenceRegressor::new(target)),
        }
    }
}

/// Serializable closed set of predictors, as stored in the model artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predictor {
    Ridge(RidgeRegressor),
    Persistence(PersistenceRegressor),
}

impl Regressor for Predictor {
    fn name(&self) -> &str {
        match self {
            Self::Ridge(r) => r.name(),
            Self::Persistence(p) => p.name(),
        }
    }

    fn fit(&mut self, feature_names: &[String], x: &[Vec<f64>], y: &[f64]) -> Result<(), TrainingError> {
        match self {
            Self::Ridge(r) => r.fit(feature_names, x, y),
            Self::Persistence(p) => p.fit(feature_names, x, y),
        }
    }

    fn predict(&self, row: &[f64]) -> Result<f64, TrainingError> {
        match self {
            Self::Ridge(r) => r.predict(row),
            Self::Persistence(p) => p.predict(row),
        }
    }
}
