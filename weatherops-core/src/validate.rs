//! Reconcile a trained model's feature contract with candidate columns.
//!
//! Two modes exist. `Strict` is used by training and automated inference: a
//! missing feature is a hard `SchemaError`. `BestEffort` is used only by the
//! manual-entry forecast, where absent features are filled from a fallback.

use std::collections::HashMap;

use crate::data::SchemaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    #[default]
    Strict,
    BestEffort,
}

/// Return `model_features` once every one of them is present in `candidate`.
///
/// The result is always in model order regardless of candidate order; a
/// predictor is order-sensitive.
pub fn validate(model_features: &[String], candidate: &[String]) -> Result<Vec<String>, SchemaError> {
    let missing: Vec<String> = model_features
        .iter()
        .filter(|f| !candidate.contains(f))
        .cloned()
        .collect();
    if missing.is_empty() {
        Ok(model_features.to_vec())
    } else {
        Err(SchemaError::MissingFeatures(missing))
    }
}

/// A single input row aligned to the model's feature order.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRow {
    pub values: Vec<f64>,
    /// Features that were absent and filled from the fallback.
    pub filled: Vec<String>,
}

/// Align a named set of values to `model_features`.
///
/// In `Strict` mode any absent feature fails. In `BestEffort` mode it is
/// filled from `fallback`, then `0.0`.
pub fn align_row(
    model_features: &[String],
    available: &HashMap<String, f64>,
    mode: ValidationMode,
    fallback: impl Fn(&str) -> Option<f64>,
) -> Result<AlignedRow, SchemaError> {
    if mode == ValidationMode::Strict {
        let present: Vec<String> = available.keys().cloned().collect();
        validate(model_features, &present)?;
    }

    let mut values = Vec::with_capacity(model_features.len());
    let mut filled = Vec::new();
    for name in model_features {
        match available.get(name) {
            Some(v) => values.push(*v),
            None => {
                values.push(fallback(name).unwrap_or(0.0));
                filled.push(name.clone());
            }
        }
    }
    Ok(AlignedRow { values, filled })
}
