//! A single daily weather observation.
//!
//! Every measurement is nullable: gaps are resolved later by the cleaner, never
//! at ingestion time. Columns outside the required set (snow depth, wind
//! direction, pressure, ...) ride along in `extra` so the raw store stays a
//! faithful copy of what was uploaded.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const TIMESTAMP: &str = "timestamp";
pub const AVG_TEMP: &str = "avg_temp";
pub const MIN_TEMP: &str = "min_temp";
pub const MAX_TEMP: &str = "max_temp";
pub const PRECIPITATION: &str = "precipitation";
pub const WIND_SPEED: &str = "wind_speed";

/// Columns every upload must carry, in canonical order.
pub const REQUIRED_COLUMNS: [&str; 6] = [
    TIMESTAMP,
    AVG_TEMP,
    MIN_TEMP,
    MAX_TEMP,
    PRECIPITATION,
    WIND_SPEED,
];

/// Measurement columns of the required set (everything but the timestamp).
pub const MEASUREMENT_COLUMNS: [&str; 5] = [AVG_TEMP, MIN_TEMP, MAX_TEMP, PRECIPITATION, WIND_SPEED];

pub const TEMPERATURE_COLUMNS: [&str; 3] = [AVG_TEMP, MIN_TEMP, MAX_TEMP];

/// One row of the time series, keyed by `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: NaiveDate,
    pub avg_temp: Option<f64>,
    pub min_temp: Option<f64>,
    pub max_temp: Option<f64>,
    pub precipitation: Option<f64>,
    pub wind_speed: Option<f64>,
    /// Non-required numeric columns, keyed by column name.
    #[serde(default)]
    pub extra: BTreeMap<String, Option<f64>>,
}

impl Observation {
    /// An observation with every measurement missing.
    pub fn empty(timestamp: NaiveDate) -> Self {
        Self {
            timestamp,
            avg_temp: None,
            min_temp: None,
            max_temp: None,
            precipitation: None,
            wind_speed: None,
            extra: BTreeMap::new(),
        }
    }

    /// Look up a measurement by canonical column name.
    ///
    /// Returns `None` both for unknown columns and for null values.
    pub fn value(&self, column: &str) -> Option<f64> {
        match column {
            AVG_TEMP => self.avg_temp,
            MIN_TEMP => self.min_temp,
            MAX_TEMP => self.max_temp,
            PRECIPITATION => self.precipitation,
            WIND_SPEED => self.wind_speed,
            other => self.extra.get(other).copied().flatten(),
        }
    }

    /// Set a measurement by column name. Unknown names land in `extra`.
    pub fn set_value(&mut self, column: &str, value: Option<f64>) {
        match column {
            AVG_TEMP => self.avg_temp = value,
            MIN_TEMP => self.min_temp = value,
            MAX_TEMP => self.max_temp = value,
            PRECIPITATION => self.precipitation = value,
            WIND_SPEED => self.wind_speed = value,
            other => {
                self.extra.insert(other.to_string(), value);
            }
        }
    }
}
