//! Ingestion boundary: validate, merge into the store, then retrain.
//!
//! Storing and retraining are separate failure domains. Once the merge is
//! persisted the upload is reported as stored, and a failed or partial
//! pipeline run only downgrades the report to a warning.

use chrono::NaiveDate;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use weatherops_core::data::{ingest_csv, DataError, MergeOutcome, ObservationProvider};
use weatherops_core::domain::Observation;

use crate::config::WeatherOpsConfig;
use crate::observer::{PipelineEvent, PipelineObserver};
use crate::orchestrator::{PipelineOrchestrator, PipelineResult, PipelineStatus};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("upload contains no observations")]
    Empty,

    #[error("fetch range is empty: {start} is after {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error(transparent)]
    Data(#[from] DataError),
}

/// Outcome of one upload or fetch.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub merge: MergeOutcome,
    pub pipeline: PipelineResult,
    pub message: String,
}

impl IngestReport {
    fn new(merge: MergeOutcome, pipeline: PipelineResult) -> Self {
        let message = match pipeline.status {
            PipelineStatus::Success => {
                "Data uploaded, appended, and model retrained successfully.".to_string()
            }
            PipelineStatus::Failed => {
                "Data uploaded and appended, but model retraining failed.".to_string()
            }
            PipelineStatus::Partial => {
                let missing: Vec<String> =
                    pipeline.missing.iter().map(|p| p.display().to_string()).collect();
                format!(
                    "Data uploaded and appended, but the pipeline left missing files: {}",
                    missing.join(", ")
                )
            }
        };
        Self {
            merge,
            pipeline,
            message,
        }
    }

    /// Rows were stored but retraining did not fully succeed.
    pub fn is_warning(&self) -> bool {
        self.pipeline.status != PipelineStatus::Success
    }
}

pub struct IngestService {
    config: WeatherOpsConfig,
    orchestrator: PipelineOrchestrator,
    observer: Arc<dyn PipelineObserver>,
}

impl IngestService {
    pub fn new(config: WeatherOpsConfig, observer: Arc<dyn PipelineObserver>) -> Self {
        let orchestrator = PipelineOrchestrator::from_config(&config, observer.clone());
        Self::with_orchestrator(config, orchestrator, observer)
    }

    pub fn with_orchestrator(
        config: WeatherOpsConfig,
        orchestrator: PipelineOrchestrator,
        observer: Arc<dyn PipelineObserver>,
    ) -> Self {
        Self {
            config,
            orchestrator,
            observer,
        }
    }

    /// Ingest an uploaded CSV file.
    pub fn ingest_file(&self, path: &Path) -> Result<IngestReport, IngestError> {
        info!(file = %path.display(), "ingesting upload");
        let observations = ingest_csv(path)?;
        self.ingest_observations(&observations)
    }

    /// Fetch an inclusive date range from `provider` and ingest it.
    pub fn fetch(
        &self,
        provider: &dyn ObservationProvider,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<IngestReport, IngestError> {
        if start > end {
            return Err(IngestError::InvalidRange { start, end });
        }
        info!(provider = provider.name(), %start, %end, "fetching observations");
        let fetched = provider.fetch(start, end)?;
        self.ingest_observations(&fetched.observations)
    }

    /// Merge `observations` into the store and run the pipeline.
    ///
    /// Returns an error only when nothing was stored.
    pub fn ingest_observations(
        &self,
        observations: &[Observation],
    ) -> Result<IngestReport, IngestError> {
        if observations.is_empty() {
            return Err(IngestError::Empty);
        }
        self.observer.on_event(&PipelineEvent::UploadReceived {
            rows: observations.len(),
        });

        let merge = self.config.store().upsert(observations)?;
        self.observer.on_event(&PipelineEvent::UploadStored {
            added: merge.added,
            replaced: merge.replaced,
            total: merge.total,
        });
        info!(
            added = merge.added,
            replaced = merge.replaced,
            total = merge.total,
            "observations stored"
        );

        let pipeline = self.orchestrator.run(merge.added + merge.replaced > 0);
        let report = IngestReport::new(merge, pipeline);
        if report.is_warning() {
            warn!(detail = %report.pipeline.detail, "{}", report.message);
        }
        Ok(report)
    }
}
