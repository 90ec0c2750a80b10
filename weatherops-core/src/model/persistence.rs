//! Persistence baseline: tomorrow looks like today.

use serde::{Deserialize, Serialize};

use super::regressor::Regressor;
use super::trainer::TrainingError;
use crate::features::lag_column_name;

/// Predicts the target's most recent observed value (its lag-1 column).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceRegressor {
    source: String,
    index: Option<usize>,
}

impl PersistenceRegressor {
    pub fn new(target: &str) -> Self {
        Self {
            source: lag_column_name(target, 1),
            index: None,
        }
    }

    /// Name of the feature this baseline repeats.
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Regressor for PersistenceRegressor {
    fn name(&self) -> &str {
        "persistence"
    }

    fn fit(&mut self, feature_names: &[String], _x: &[Vec<f64>], _y: &[f64]) -> Result<(), TrainingError> {
        let index = feature_names
            .iter()
            .position(|f| *f == self.source)
            .ok_or_else(|| TrainingError::MissingFeature(self.source.clone()))?;
        self.index = Some(index);
        Ok(())
    }

    fn predict(&self, row: &[f64]) -> Result<f64, TrainingError> {
        let index = self.index.ok_or(TrainingError::NotFitted)?;
        row.get(index).copied().ok_or(TrainingError::DimensionMismatch {
            expected: index + 1,
            got: row.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeats_lag_one() {
        let mut p = PersistenceRegressor::new("avg_temp");
        let names = vec!["min_temp".to_string(), "avg_temp_t-1".to_string()];
        p.fit(&names, &[], &[]).unwrap();
        assert_eq!(p.predict(&[3.0, 27.5]).unwrap(), 27.5);
    }

    #[test]
    fn requires_lag_one_feature() {
        let mut p = PersistenceRegressor::new("avg_temp");
        let err = p.fit(&["min_temp".to_string()], &[], &[]).unwrap_err();
        assert!(matches!(err, TrainingError::MissingFeature(ref f) if f == "avg_temp_t-1"));
    }

    #[test]
    fn unfitted_predict_fails() {
        let p = PersistenceRegressor::new("avg_temp");
        assert!(matches!(p.predict(&[1.0]), Err(TrainingError::NotFitted)));
    }
}
