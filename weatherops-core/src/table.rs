//! The cleaned, analysis-ready table.
//!
//! A `CleanedTable` is a derived copy of the observation store: ascending by
//! timestamp, a `Date` timestamp column and `Float64` measurement columns.
//! It is recomputed in full by the cleaner and never partially updated;
//! forecasting works on a private clone.

use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;

use crate::data::frame::{
    column_names, date_column, float_values, is_numeric, read_csv, timestamp_values,
    write_csv_atomic,
};
use crate::data::DataError;
use crate::domain::TIMESTAMP;

#[derive(Debug, Clone)]
pub struct CleanedTable {
    frame: DataFrame,
}

impl CleanedTable {
    /// Wrap a frame, normalizing the timestamp to `Date`, numeric columns to
    /// `Float64`, and sorting ascending by timestamp.
    ///
    /// Non-numeric columns other than the timestamp are dropped.
    pub fn from_frame(df: DataFrame) -> Result<Self, DataError> {
        let dates = timestamp_values(&df)?;
        let parsed: Vec<NaiveDate> = dates
            .iter()
            .enumerate()
            .map(|(row, d)| {
                d.ok_or_else(|| {
                    DataError::Validation(format!("row {}: unparseable {TIMESTAMP}", row + 1))
                })
            })
            .collect::<Result<_, _>>()?;

        let mut columns = vec![date_column(TIMESTAMP, &parsed)?];
        for column in df.get_columns() {
            let name = column.name().to_string();
            if name == TIMESTAMP {
                continue;
            }
            let all_null = column.null_count() == column.len();
            if is_numeric(column.dtype()) || all_null {
                columns.push(Column::new(name.as_str().into(), float_values(&df, &name)?));
            }
        }

        let frame = DataFrame::new(columns)?.sort([TIMESTAMP], SortMultipleOptions::default())?;
        Ok(Self { frame })
    }

    /// Load a cleaned table previously written with [`CleanedTable::save`].
    pub fn load(path: &Path) -> Result<Self, DataError> {
        Self::from_frame(read_csv(path)?)
    }

    /// Persist as CSV, atomically.
    pub fn save(&self, path: &Path) -> Result<(), DataError> {
        write_csv_atomic(&self.frame, path)
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    pub fn column_names(&self) -> Vec<String> {
        column_names(&self.frame)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.get_column_index(name).is_some()
    }

    pub fn timestamps(&self) -> Result<Vec<NaiveDate>, DataError> {
        Ok(timestamp_values(&self.frame)?.into_iter().flatten().collect())
    }

    pub fn values(&self, name: &str) -> Result<Vec<Option<f64>>, DataError> {
        Ok(float_values(&self.frame, name)?)
    }

    /// Median of the non-null values of a column.
    pub fn median(&self, name: &str) -> Option<f64> {
        self.frame
            .column(name)
            .ok()
            .and_then(|c| c.as_materialized_series().median())
    }

    /// Keep only the last `n` rows.
    pub fn tail(&self, n: usize) -> Self {
        Self {
            frame: self.frame.tail(Some(n)),
        }
    }

    /// Timestamp and column values of the most recent row.
    pub fn last_row(&self) -> Result<Option<(NaiveDate, BTreeMap<String, Option<f64>>)>, DataError> {
        let Some(date) = self.timestamps()?.last().copied() else {
            return Ok(None);
        };
        let mut values = BTreeMap::new();
        for name in self.column_names() {
            if name == TIMESTAMP {
                continue;
            }
            let last = self.values(&name)?.last().copied().flatten();
            values.insert(name, last);
        }
        Ok(Some((date, values)))
    }

    /// Append one row after the current last row.
    ///
    /// `value_of` supplies the value for every non-timestamp column.
    pub fn push_row(
        &mut self,
        timestamp: NaiveDate,
        mut value_of: impl FnMut(&str) -> Option<f64>,
    ) -> Result<(), DataError> {
        let mut columns = Vec::with_capacity(self.frame.width());
        for column in self.frame.get_columns() {
            let name = column.name().to_string();
            if name == TIMESTAMP {
                columns.push(date_column(TIMESTAMP, &[timestamp])?);
            } else {
                columns.push(Column::new(name.as_str().into(), vec![value_of(&name)]));
            }
        }
        let row = DataFrame::new(columns)?;
        self.frame.vstack_mut(&row)?;
        Ok(())
    }
}

impl TryFrom<DataFrame> for CleanedTable {
    type Error = DataError;

    fn try_from(df: DataFrame) -> Result<Self, Self::Error> {
        Self::from_frame(df)
    }
}
