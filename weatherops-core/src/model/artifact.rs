//! Model and metrics artifacts on disk.
//!
//! Both are JSON and written atomically: serialize to `<file>.tmp`, then
//! rename over the target. A reader sees either the previous artifact or the
//! new one, never a partial write.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::trainer::{Metrics, TrainedModel, MODEL_FORMAT_VERSION};

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact not found: {}", path.display())]
    Missing { path: PathBuf },

    #[error("artifact I/O at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("artifact at {} is corrupt: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported model format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

pub fn save_model(model: &TrainedModel, path: &Path) -> Result<(), ArtifactError> {
    write_json_atomic(model, path)
}

/// Load a model artifact, rejecting unknown format versions.
pub fn load_model(path: &Path) -> Result<TrainedModel, ArtifactError> {
    let model: TrainedModel = read_json(path)?;
    if model.format_version != MODEL_FORMAT_VERSION {
        return Err(ArtifactError::UnsupportedVersion {
            found: model.format_version,
            expected: MODEL_FORMAT_VERSION,
        });
    }
    Ok(model)
}

pub fn save_metrics(metrics: &Metrics, path: &Path) -> Result<(), ArtifactError> {
    write_json_atomic(metrics, path)
}

pub fn load_metrics(path: &Path) -> Result<Metrics, ArtifactError> {
    read_json(path)
}

/// Paths from `expected` that do not exist on disk.
pub fn missing_artifacts(expected: &[&Path]) -> Vec<PathBuf> {
    expected
        .iter()
        .filter(|p| !p.is_file())
        .map(|p| p.to_path_buf())
        .collect()
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let text = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ArtifactError::Missing { path: path.to_path_buf() }
        } else {
            ArtifactError::Io { path: path.to_path_buf(), source }
        }
    })?;
    serde_json::from_str(&text).map_err(|source| ArtifactError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json_atomic<T: Serialize>(value: &T, path: &Path) -> Result<(), ArtifactError> {
    let io_err = |source| ArtifactError::Io { path: path.to_path_buf(), source };
    let json = serde_json::to_string_pretty(value).map_err(|source| ArtifactError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, json).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        io_err(e)
    })
}
