//! Observation provider trait and structured data errors.
//!
//! The `ObservationProvider` trait abstracts over remote sources of daily
//! observations so ingestion can be driven from an upload or from a fetch, and
//! so tests can substitute a canned provider.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::schema::SchemaError;
use crate::domain::Observation;

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("csv error: {0}")]
    Csv(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("store is locked by another writer ({path}); waited {waited_ms}ms")]
    StoreLocked { path: String, waited_ms: u64 },

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider")]
    RateLimited,

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("provider rejected request: {0}")]
    Rejected(String),

    #[error("dataframe error: {0}")]
    Frame(#[from] polars::error::PolarsError),
}

/// Where a batch of observations came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    Upload,
    OpenMeteo,
}

/// Result of a successful fetch.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub observations: Vec<Observation>,
    pub source: DataSource,
}

/// A remote source of daily observations for a fixed location.
pub trait ObservationProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily observations over an inclusive date range.
    fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<FetchResult, DataError>;
}
