//! DataFrame plumbing shared by the store, cleaner and feature builder.
//!
//! Timestamps live in a polars `Date` column; every measurement column is
//! `Float64`. CSV files carry dates as `YYYY-MM-DD` strings and are parsed
//! back here, so the on-disk format stays readable by any tool.

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use super::provider::DataError;
use crate::domain::{Observation, MEASUREMENT_COLUMNS, TIMESTAMP};

/// Days between 0001-01-01 (CE day 1) and the Unix epoch.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

pub fn date_to_epoch_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

pub fn epoch_days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE)
}

/// Parse `YYYY-MM-DD`, tolerating a trailing time part (`2024-01-01 00:00:00`).
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Column names of a frame, in frame order.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_columns().iter().map(|c| c.name().to_string()).collect()
}

/// Build a `Date` column from calendar dates.
pub fn date_column(name: &str, dates: &[NaiveDate]) -> PolarsResult<Column> {
    let days: Vec<i32> = dates.iter().map(|d| date_to_epoch_days(*d)).collect();
    Column::new(name.into(), days).cast(&DataType::Date)
}

/// Read the timestamp column back into calendar dates.
///
/// Accepts `Date`, `Datetime` and string columns; rows that cannot be parsed
/// come back as `None`.
pub fn timestamp_values(df: &DataFrame) -> PolarsResult<Vec<Option<NaiveDate>>> {
    let column = df.column(TIMESTAMP)?;
    match column.dtype() {
        DataType::Date => {
            let days = column.cast(&DataType::Int32)?;
            Ok(days
                .i32()?
                .into_iter()
                .map(|d| d.and_then(epoch_days_to_date))
                .collect())
        }
        _ => {
            let text = column.cast(&DataType::String)?;
            Ok(text
                .str()?
                .into_iter()
                .map(|s| s.and_then(parse_date))
                .collect())
        }
    }
}

/// Nullable `f64` values of a column, casting numeric types as needed.
pub fn float_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let column = df.column(name)?.cast(&DataType::Float64)?;
    Ok(column.f64()?.into_iter().collect())
}

/// Whether a dtype can be treated as a measurement.
pub fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float64
            | DataType::Float32
            | DataType::Int64
            | DataType::Int32
            | DataType::Int16
            | DataType::Int8
            | DataType::UInt64
            | DataType::UInt32
            | DataType::UInt16
            | DataType::UInt8
    )
}

/// Keep only rows with a value in every listed column.
pub fn complete_rows(df: &DataFrame, columns: &[String]) -> PolarsResult<DataFrame> {
    let mut mask = BooleanChunked::full("complete".into(), true, df.height());
    for name in columns {
        let present = df.column(name)?.is_not_null();
        mask = &mask & &present;
    }
    df.filter(&mask)
}

/// Convert observations into a frame: timestamp, required measurements, then
/// extra columns in sorted name order.
pub fn observations_to_frame(observations: &[Observation]) -> PolarsResult<DataFrame> {
    let dates: Vec<NaiveDate> = observations.iter().map(|o| o.timestamp).collect();
    let mut columns = vec![date_column(TIMESTAMP, &dates)?];

    for name in MEASUREMENT_COLUMNS {
        let values: Vec<Option<f64>> = observations.iter().map(|o| o.value(name)).collect();
        columns.push(Column::new(name.into(), values));
    }

    let extra_names: BTreeSet<&str> = observations
        .iter()
        .flat_map(|o| o.extra.keys().map(String::as_str))
        .collect();
    for name in extra_names {
        let values: Vec<Option<f64>> = observations
            .iter()
            .map(|o| o.extra.get(name).copied().flatten())
            .collect();
        columns.push(Column::new(name.into(), values));
    }

    DataFrame::new(columns)
}

/// Read a headered CSV file into a frame, scanning every row for the schema.
pub fn read_csv(path: &Path) -> Result<DataFrame, DataError> {
    LazyCsvReader::new(path)
        .with_has_header(true)
        .with_infer_schema_length(None)
        .finish()
        .and_then(|lf| lf.collect())
        .map_err(|e| DataError::Csv(format!("{}: {e}", path.display())))
}

/// Write a frame as CSV, atomically: write to `.tmp` then rename into place.
pub fn write_csv_atomic(df: &DataFrame, path: &Path) -> Result<(), DataError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| DataError::Store(format!("create {}: {e}", parent.display())))?;
        }
    }

    let tmp_path = path.with_extension("csv.tmp");
    let mut file = fs::File::create(&tmp_path)
        .map_err(|e| DataError::Store(format!("create {}: {e}", tmp_path.display())))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df.clone())
        .map_err(|e| DataError::Csv(format!("write {}: {e}", tmp_path.display())))?;
    drop(file);

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        DataError::Store(format!("atomic rename to {} failed: {e}", path.display()))
    })
}
