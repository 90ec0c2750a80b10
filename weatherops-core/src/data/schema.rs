use polars::prelude::*;

use crate::data::frame::column_names;
use crate::domain::REQUIRED_COLUMNS;

/// Meteostat-style column names accepted on upload, mapped to canonical names.
pub const COLUMN_ALIASES: [(&str, &str); 6] = [
    ("time", "timestamp"),
    ("tavg", "avg_temp"),
    ("tmin", "min_temp"),
    ("tmax", "max_temp"),
    ("prcp", "precipitation"),
    ("wspd", "wind_speed"),
];

/// Expected shape of an observation upload.
pub struct ObservationSchema;

impl ObservationSchema {
    /// Canonical name for a column, resolving upload aliases.
    pub fn canonical_name(name: &str) -> &str {
        COLUMN_ALIASES
            .iter()
            .find(|(alias, _)| *alias == name)
            .map(|(_, canonical)| *canonical)
            .unwrap_or(name)
    }

    /// Rename aliased columns to their canonical names.
    ///
    /// An alias is left alone when its canonical column is already present,
    /// so an upload carrying both never ends up with duplicate names.
    pub fn canonicalize_columns(df: &mut DataFrame) -> PolarsResult<()> {
        let present = column_names(df);
        for (alias, canonical) in COLUMN_ALIASES {
            if present.iter().any(|c| c == alias) && !present.iter().any(|c| c == canonical) {
                df.rename(alias, canonical.into())?;
            }
        }
        Ok(())
    }

    /// Names of required columns absent from `df`, in canonical order.
    pub fn missing_columns(df: &DataFrame) -> Vec<String> {
        let present = column_names(df);
        REQUIRED_COLUMNS
            .iter()
            .filter(|required| !present.iter().any(|c| c == *required))
            .map(|s| s.to_string())
            .collect()
    }

    /// Reject a frame that lacks any required column.
    pub fn validate(df: &DataFrame) -> Result<(), SchemaError> {
        let missing = Self::missing_columns(df);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::MissingColumns(missing))
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("feature schema mismatch, model expects features absent from input: {}", .0.join(", "))]
    MissingFeatures(Vec<String>),
}
