//! Upload ingestion: CSV frame → validated observations.
//!
//! The pipeline is:
//! 1. Rename Meteostat aliases to canonical column names
//! 2. Reject the upload if any required column is missing (listing all of them)
//! 3. Parse timestamps; an unparseable timestamp rejects the upload
//! 4. Reject negative precipitation or wind speed
//! 5. Carry every other numeric column along as an extra measurement

use polars::prelude::*;
use std::path::Path;

use super::frame::{float_values, is_numeric, read_csv, timestamp_values};
use super::provider::DataError;
use super::schema::ObservationSchema;
use crate::domain::{Observation, MEASUREMENT_COLUMNS, PRECIPITATION, TIMESTAMP, WIND_SPEED};

/// Read and validate an uploaded CSV file.
pub fn ingest_csv(path: &Path) -> Result<Vec<Observation>, DataError> {
    let df = read_csv(path)?;
    observations_from_frame(df)
}

/// Validate an upload frame and convert it into observations, in upload order.
pub fn observations_from_frame(mut df: DataFrame) -> Result<Vec<Observation>, DataError> {
    ObservationSchema::canonicalize_columns(&mut df)?;
    ObservationSchema::validate(&df)?;

    let timestamps = timestamp_values(&df)?;
    let mut observations = Vec::with_capacity(df.height());
    for (row, ts) in timestamps.into_iter().enumerate() {
        let timestamp = ts.ok_or_else(|| {
            DataError::Validation(format!("row {}: unparseable {TIMESTAMP}", row + 1))
        })?;
        observations.push(Observation::empty(timestamp));
    }

    for name in MEASUREMENT_COLUMNS {
        for (obs, value) in observations.iter_mut().zip(float_values(&df, name)?) {
            obs.set_value(name, value);
        }
    }

    for column in df.get_columns() {
        let name = column.name().to_string();
        if name == TIMESTAMP || MEASUREMENT_COLUMNS.contains(&name.as_str()) {
            continue;
        }
        if !is_numeric(column.dtype()) && !column_is_all_null(column) {
            continue;
        }
        for (obs, value) in observations.iter_mut().zip(float_values(&df, &name)?) {
            obs.extra.insert(name.clone(), value);
        }
    }

    validate_non_negative(&observations)?;
    Ok(observations)
}

fn column_is_all_null(column: &Column) -> bool {
    column.null_count() == column.len()
}

/// Reject negative precipitation or wind speed.
pub fn validate_non_negative(observations: &[Observation]) -> Result<(), DataError> {
    for obs in observations {
        for name in [PRECIPITATION, WIND_SPEED] {
            if let Some(v) = obs.value(name) {
                if v < 0.0 {
                    return Err(DataError::Validation(format!(
                        "{name} must be non-negative, got {v} on {}",
                        obs.timestamp
                    )));
                }
            }
        }
    }
    Ok(())
}
