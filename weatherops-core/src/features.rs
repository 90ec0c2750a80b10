//! Lag feature construction.
//!
//! For each base feature `f` and each `k` in `1..=lags`, the builder adds a
//! column `f_t-k` holding the value of `f` from `k` rows earlier. Rows where
//! any column is undefined (the first `lags` rows) are dropped. Only past
//! values are ever referenced, so there is no leakage from the target row.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::frame::{column_names, complete_rows, float_values};
use crate::domain::{MEASUREMENT_COLUMNS, TIMESTAMP};
use crate::table::CleanedTable;

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("base feature '{0}' is not a column of the cleaned table")]
    MissingBaseFeature(String),

    #[error("lag count must be at least 1")]
    ZeroLags,

    #[error(transparent)]
    Frame(#[from] PolarsError),
}

/// Which columns to lag and how far back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LagSpec {
    pub base_features: Vec<String>,
    pub lags: usize,
}

impl Default for LagSpec {
    fn default() -> Self {
        Self {
            base_features: MEASUREMENT_COLUMNS.iter().map(|s| s.to_string()).collect(),
            lags: 3,
        }
    }
}

impl LagSpec {
    pub fn new(base_features: Vec<String>, lags: usize) -> Self {
        Self { base_features, lags }
    }

    /// Lag column names in construction order: base outer, lag inner.
    pub fn lag_columns(&self) -> Vec<String> {
        self.base_features
            .iter()
            .flat_map(|base| (1..=self.lags).map(move |k| lag_column_name(base, k)))
            .collect()
    }
}

/// `"{base}_t-{k}"`
pub fn lag_column_name(base: &str, k: usize) -> String {
    format!("{base}_t-{k}")
}

/// Split a lag column name back into its base and lag.
pub fn parse_lag_column(name: &str) -> Option<(&str, usize)> {
    let (base, k) = name.rsplit_once("_t-")?;
    let k: usize = k.parse().ok()?;
    (k > 0 && !base.is_empty()).then_some((base, k))
}

/// Cleaned table plus lag columns, with incomplete rows removed.
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    frame: DataFrame,
    spec: LagSpec,
}

impl FeatureMatrix {
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn spec(&self) -> &LagSpec {
        &self.spec
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    pub fn columns(&self) -> Vec<String> {
        column_names(&self.frame)
    }

    /// Every column except the timestamp and `target`, in frame order.
    pub fn feature_columns(&self, target: &str) -> Vec<String> {
        self.columns()
            .into_iter()
            .filter(|c| c != TIMESTAMP && c != target)
            .collect()
    }

    /// Values of one column; rows are complete so nulls never appear.
    pub fn column_values(&self, name: &str) -> PolarsResult<Vec<f64>> {
        Ok(float_values(&self.frame, name)?.into_iter().flatten().collect())
    }

    /// Values of the named columns at row `index`, in the given order.
    pub fn row(&self, names: &[String], index: usize) -> PolarsResult<Vec<f64>> {
        names
            .iter()
            .map(|name| {
                let column = self.frame.column(name)?.f64()?;
                column.get(index).ok_or_else(|| {
                    PolarsError::OutOfBounds(format!("row {index} of '{name}' is null").into())
                })
            })
            .collect()
    }

    /// Row-major design matrix over the named columns.
    pub fn design(&self, names: &[String]) -> PolarsResult<Vec<Vec<f64>>> {
        let columns: Vec<Vec<f64>> = names
            .iter()
            .map(|n| self.column_values(n))
            .collect::<PolarsResult<_>>()?;
        Ok((0..self.height())
            .map(|row| columns.iter().map(|c| c[row]).collect())
            .collect())
    }
}

pub struct FeatureBuilder;

impl FeatureBuilder {
    /// Add lag columns for every base feature and drop incomplete rows.
    ///
    /// The output has `max(0, rows - lags)` rows when the input is complete.
    pub fn build(table: &CleanedTable, spec: &LagSpec) -> Result<FeatureMatrix, FeatureError> {
        if spec.lags == 0 {
            return Err(FeatureError::ZeroLags);
        }
        let mut df = table.frame().clone();
        for base in &spec.base_features {
            if df.get_column_index(base).is_none() {
                return Err(FeatureError::MissingBaseFeature(base.clone()));
            }
        }

        for base in &spec.base_features {
            let source = df.column(base)?.as_materialized_series().clone();
            for k in 1..=spec.lags {
                let lagged = source.shift(k as i64).with_name(lag_column_name(base, k).into());
                df.with_column(lagged)?;
            }
        }

        let all = column_names(&df);
        let frame = complete_rows(&df, &all)?;
        Ok(FeatureMatrix {
            frame,
            spec: spec.clone(),
        })
    }
}
