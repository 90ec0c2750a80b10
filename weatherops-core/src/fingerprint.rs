//! Content hashes binding a model artifact to its inputs.
//!
//! - `DatasetHash`: identity of the feature matrix a model was trained on.
//! - `FeatureConfigHash`: identity of the lag configuration (base features,
//!   lag count, target). A model whose hash differs from the current
//!   configuration was built against a different feature contract.

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

use crate::features::LagSpec;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetHash(pub String);

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureConfigHash(pub String);

impl fmt::Display for FeatureConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// BLAKE3 over a frame's column names and values, in row order.
pub fn dataset_hash(frame: &DataFrame) -> DatasetHash {
    let mut hasher = blake3::Hasher::new();
    for column in frame.get_columns() {
        hasher.update(column.name().as_bytes());
        hasher.update(&[0]);
        let series = column.as_materialized_series();
        for i in 0..series.len() {
            match series.get(i) {
                Ok(value) => hasher.update(value.to_string().as_bytes()),
                Err(_) => hasher.update(b"?"),
            };
            hasher.update(&[0x1f]);
        }
        hasher.update(&[0x1e]);
    }
    DatasetHash(hasher.finalize().to_hex().to_string())
}

/// BLAKE3 over the canonical JSON of the lag configuration and target.
pub fn feature_config_hash(spec: &LagSpec, target: &str) -> FeatureConfigHash {
    // json! objects serialize with sorted keys
    let canonical = json!({
        "base_features": spec.base_features,
        "lags": spec.lags,
        "target": target,
    });
    FeatureConfigHash(blake3::hash(canonical.to_string().as_bytes()).to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::CleanedTable;
    use polars::prelude::*;

    fn table(values: &[f64]) -> DataFrame {
        let dates: Vec<String> = (1..=values.len()).map(|d| format!("2024-03-{d:02}")).collect();
        CleanedTable::from_frame(df!("timestamp" => dates, "avg_temp" => values.to_vec()).unwrap())
            .unwrap()
            .frame()
            .clone()
    }

    #[test]
    fn dataset_hash_is_stable_and_content_sensitive() {
        let a = dataset_hash(&table(&[1.0, 2.0]));
        assert_eq!(a, dataset_hash(&table(&[1.0, 2.0])));
        assert_ne!(a, dataset_hash(&table(&[1.0, 2.5])));
        assert_eq!(a.0.len(), 64);
    }

    #[test]
    fn feature_hash_tracks_lags_order_and_target() {
        let spec = LagSpec::new(vec!["a".into(), "b".into()], 3);
        let base = feature_config_hash(&spec, "a");
        assert_eq!(base, feature_config_hash(&spec.clone(), "a"));
        assert_ne!(base, feature_config_hash(&LagSpec::new(spec.base_features.clone(), 2), "a"));
        assert_ne!(base, feature_config_hash(&LagSpec::new(vec!["b".into(), "a".into()], 3), "a"));
        assert_ne!(base, feature_config_hash(&spec, "b"));
    }
}
