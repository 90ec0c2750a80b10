//! Gap-filling and column pruning for raw observations.
//!
//! Policy, applied in order:
//! 1. Drop low-value columns (snow, wind direction, gusts, pressure, sunshine)
//! 2. Temperatures: forward-carry the last observed value
//! 3. Precipitation: missing means no rain, fill with zero
//! 4. Wind speed: forward-carry, then fill leading gaps with the column median
//! 5. Drop rows still missing a required value
//!
//! Any other retained numeric column follows the wind-speed policy; a column
//! with no values at all is dropped. The output is a pure function of the input.

use polars::prelude::*;

use crate::data::frame::{column_names, complete_rows, observations_to_frame};
use crate::data::DataError;
use crate::domain::{
    Observation, MEASUREMENT_COLUMNS, PRECIPITATION, TEMPERATURE_COLUMNS, TIMESTAMP, WIND_SPEED,
};
use crate::table::CleanedTable;

/// Columns removed before cleaning when present.
pub const DROPPED_COLUMNS: [&str; 5] = ["snow", "wdir", "wpgt", "pres", "tsun"];

/// Summary of what a cleaning pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub input_rows: usize,
    pub output_rows: usize,
    pub dropped_columns: Vec<String>,
    pub filled_values: usize,
}

#[derive(Debug, Clone)]
pub struct Cleaner {
    dropped: Vec<String>,
}

impl Default for Cleaner {
    fn default() -> Self {
        Self {
            dropped: DROPPED_COLUMNS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Cleaner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom set of columns to drop.
    pub fn with_dropped_columns(dropped: Vec<String>) -> Self {
        Self { dropped }
    }

    /// Clean stored observations.
    pub fn clean(&self, observations: &[Observation]) -> Result<(CleanedTable, CleanReport), DataError> {
        let df = observations_to_frame(observations)?;
        self.clean_frame(df)
    }

    /// Clean an arbitrary observation frame.
    pub fn clean_frame(&self, df: DataFrame) -> Result<(CleanedTable, CleanReport), DataError> {
        let input_rows = df.height();
        let mut report = CleanReport {
            input_rows,
            ..CleanReport::default()
        };

        // Normalizes types and sorts, so fills below run in timestamp order.
        let mut df = CleanedTable::from_frame(df)?.frame().clone();
        let nulls_before = total_nulls(&df);

        for name in &self.dropped {
            if df.get_column_index(name).is_some() {
                df = df.drop(name)?;
                report.dropped_columns.push(name.clone());
            }
        }

        for name in TEMPERATURE_COLUMNS {
            fill_strategy(&mut df, name, FillNullStrategy::Forward(None))?;
        }
        fill_strategy(&mut df, PRECIPITATION, FillNullStrategy::Zero)?;

        let extra: Vec<String> = column_names(&df)
            .into_iter()
            .filter(|c| c != TIMESTAMP && !MEASUREMENT_COLUMNS.contains(&c.as_str()))
            .collect();
        for name in std::iter::once(WIND_SPEED.to_string()).chain(extra.iter().cloned()) {
            fill_strategy(&mut df, &name, FillNullStrategy::Forward(None))?;
            fill_median(&mut df, &name)?;
        }
        for name in &extra {
            let column = df.column(name)?;
            if column.null_count() == column.len() && column.len() > 0 {
                df = df.drop(name)?;
                report.dropped_columns.push(name.clone());
            }
        }

        let nulls_after_fill = total_nulls(&df);
        report.filled_values = nulls_before.saturating_sub(nulls_after_fill);

        let required: Vec<String> = MEASUREMENT_COLUMNS
            .iter()
            .filter(|c| df.get_column_index(c).is_some())
            .map(|c| c.to_string())
            .collect();
        let df = complete_rows(&df, &required)?;
        report.output_rows = df.height();

        Ok((CleanedTable::from_frame(df)?, report))
    }
}

/// Nulls in columns that hold at least one value.
fn total_nulls(df: &DataFrame) -> usize {
    df.get_columns()
        .iter()
        .map(|c| c.null_count())
        .filter(|&n| n < df.height())
        .sum()
}

fn fill_strategy(df: &mut DataFrame, name: &str, strategy: FillNullStrategy) -> PolarsResult<()> {
    if df.get_column_index(name).is_none() {
        return Ok(());
    }
    let filled = df.column(name)?.as_materialized_series().fill_null(strategy)?;
    df.with_column(filled)?;
    Ok(())
}

/// Fill remaining nulls with the median of the column's non-null values.
fn fill_median(df: &mut DataFrame, name: &str) -> PolarsResult<()> {
    if df.get_column_index(name).is_none() {
        return Ok(());
    }
    let series = df.column(name)?.as_materialized_series().clone();
    let Some(median) = series.median() else {
        return Ok(());
    };
    let filled: Float64Chunked = series.f64()?.into_iter().map(|v| v.or(Some(median))).collect();
    df.with_column(filled.with_name(name.into()).into_series())?;
    Ok(())
}
