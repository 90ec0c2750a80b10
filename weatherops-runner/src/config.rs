//! TOML configuration for the pipeline, with defaults for every section.
//!
//! An empty file is a valid configuration. Relative paths are resolved
//! against the working directory unless [`WeatherOpsConfig::with_root`] is
//! used.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use weatherops_core::data::{ObservationStore, OpenMeteoSettings};
use weatherops_core::domain::{AVG_TEMP, MEASUREMENT_COLUMNS};
use weatherops_core::fingerprint::{feature_config_hash, FeatureConfigHash};
use weatherops_core::model::{ModelKind, TrainerConfig};
use weatherops_core::LagSpec;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WeatherOpsConfig {
    pub paths: PathsConfig,
    pub features: FeaturesConfig,
    pub model: ModelConfig,
    pub pipeline: PipelineConfig,
    pub provider: ProviderConfig,
}

/// Locations of the store and the derived artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub raw_store: PathBuf,
    pub cleaned_table: PathBuf,
    pub model: PathBuf,
    pub metrics: PathBuf,
    pub lock: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_store: PathBuf::from("data/raw_weather.csv"),
            cleaned_table: PathBuf::from("data/cleaned_weather.csv"),
            model: PathBuf::from("model.json"),
            metrics: PathBuf::from("metrics.json"),
            lock: PathBuf::from("data/raw_weather.lock"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    pub base_features: Vec<String>,
    pub lags: usize,
    pub target: String,
    pub test_fraction: f64,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            base_features: MEASUREMENT_COLUMNS.iter().map(|s| s.to_string()).collect(),
            lags: 3,
            target: AVG_TEMP.to_string(),
            test_fraction: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelName {
    #[default]
    Ridge,
    Persistence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub kind: ModelName,
    pub ridge_alpha: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: ModelName::Ridge,
            ridge_alpha: 1.0,
        }
    }
}

/// The external declarative pipeline runner (DVC by default).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub enabled: bool,
    pub command: String,
    pub args: Vec<String>,
    /// Run once when `init_marker` is absent from `workdir`.
    pub init_command: Vec<String>,
    pub init_marker: String,
    pub workdir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: "dvc".into(),
            args: vec!["repro".into()],
            init_command: vec!["dvc".into(), "init".into(), "--no-scm".into()],
            init_marker: ".dvc".into(),
            workdir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub latitude: f64,
    pub longitude: f64,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        let settings = OpenMeteoSettings::default();
        Self {
            latitude: settings.latitude,
            longitude: settings.longitude,
            base_url: settings.base_url,
            timeout_secs: settings.timeout.as_secs(),
        }
    }
}

impl WeatherOpsConfig {
    /// Load and validate a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` when given, otherwise the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let f = &self.features;
        if f.lags == 0 {
            return Err(ConfigError::Invalid("features.lags must be at least 1".into()));
        }
        if !(f.test_fraction > 0.0 && f.test_fraction < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "features.test_fraction must be in (0, 1), got {}",
                f.test_fraction
            )));
        }
        if f.base_features.is_empty() {
            return Err(ConfigError::Invalid("features.base_features is empty".into()));
        }
        let unique: BTreeSet<&String> = f.base_features.iter().collect();
        if unique.len() != f.base_features.len() {
            return Err(ConfigError::Invalid("features.base_features has duplicates".into()));
        }
        if !f.base_features.contains(&f.target) {
            return Err(ConfigError::Invalid(format!(
                "features.target '{}' must be one of base_features",
                f.target
            )));
        }
        if !(self.model.ridge_alpha >= 0.0 && self.model.ridge_alpha.is_finite()) {
            return Err(ConfigError::Invalid("model.ridge_alpha must be non-negative".into()));
        }
        if self.pipeline.enabled && self.pipeline.command.trim().is_empty() {
            return Err(ConfigError::Invalid("pipeline.command is empty".into()));
        }
        Ok(())
    }

    /// Resolve every relative path against `root`.
    pub fn with_root(mut self, root: &Path) -> Self {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = root.join(&*p);
            }
        };
        join(&mut self.paths.raw_store);
        join(&mut self.paths.cleaned_table);
        join(&mut self.paths.model);
        join(&mut self.paths.metrics);
        join(&mut self.paths.lock);
        join(&mut self.pipeline.workdir);
        self
    }

    pub fn lag_spec(&self) -> LagSpec {
        LagSpec::new(self.features.base_features.clone(), self.features.lags)
    }

    pub fn model_kind(&self) -> ModelKind {
        match self.model.kind {
            ModelName::Ridge => ModelKind::Ridge {
                alpha: self.model.ridge_alpha,
            },
            ModelName::Persistence => ModelKind::Persistence,
        }
    }

    pub fn trainer_config(&self) -> TrainerConfig {
        TrainerConfig {
            target: self.features.target.clone(),
            test_fraction: self.features.test_fraction,
            model: self.model_kind(),
        }
    }

    /// Hash of the lag configuration and target; stored in the model artifact.
    pub fn feature_config_hash(&self) -> FeatureConfigHash {
        feature_config_hash(&self.lag_spec(), &self.features.target)
    }

    pub fn store(&self) -> ObservationStore {
        ObservationStore::new(&self.paths.raw_store, &self.paths.lock)
    }

    pub fn provider_settings(&self) -> OpenMeteoSettings {
        OpenMeteoSettings {
            latitude: self.provider.latitude,
            longitude: self.provider.longitude,
            base_url: self.provider.base_url.clone(),
            timeout: Duration::from_secs(self.provider.timeout_secs),
        }
    }
}
