//! Primary/fallback pipeline orchestration.
//!
//! ```text
//! Idle → RunningPrimary ─ok──────────────────────→ Success
//!              │
//!              └─err→ RunningFallback ─ok─────────→ Success
//!                              └─err─────────────→ Failed
//! ```
//!
//! After a path completes, the cleaned table and the model artifact must
//! exist on disk. A run that raised no error but left either missing is
//! `Partial`: existence of the outputs is the success criterion. The
//! orchestrator never touches the observation store, so a failed run cannot
//! lose ingested data.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use weatherops_core::model::{missing_artifacts, Metrics};

use crate::config::WeatherOpsConfig;
use crate::observer::{PipelineEvent, PipelineObserver};
use crate::strategy::{DeclarativeStrategy, InProcessStrategy, PipelineStrategy, StrategyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    Idle,
    RunningPrimary,
    RunningFallback,
    Success,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStatus {
    Success,
    Partial,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineVia {
    Primary,
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub status: PipelineStatus,
    pub via: PipelineVia,
    pub detail: String,
    /// Expected artifacts absent after the run.
    pub missing: Vec<PathBuf>,
    /// Why the primary strategy did not complete, when it did not.
    pub primary_error: Option<String>,
    pub metrics: Option<Metrics>,
    /// States visited, in order.
    pub states: Vec<PipelineState>,
}

impl PipelineResult {
    pub fn is_success(&self) -> bool {
        self.status == PipelineStatus::Success
    }
}

pub struct PipelineOrchestrator {
    primary: Box<dyn PipelineStrategy>,
    fallback: Box<dyn PipelineStrategy>,
    expected: Vec<PathBuf>,
    observer: Arc<dyn PipelineObserver>,
}

impl PipelineOrchestrator {
    /// `expected` lists the artifacts a completed run must leave on disk.
    pub fn new(
        primary: Box<dyn PipelineStrategy>,
        fallback: Box<dyn PipelineStrategy>,
        expected: Vec<PathBuf>,
        observer: Arc<dyn PipelineObserver>,
    ) -> Self {
        Self {
            primary,
            fallback,
            expected,
            observer,
        }
    }

    /// Declarative runner first, in-process pipeline as fallback; expects the
    /// cleaned table and the model artifact.
    pub fn from_config(config: &WeatherOpsConfig, observer: Arc<dyn PipelineObserver>) -> Self {
        Self::new(
            Box::new(DeclarativeStrategy::new(config.pipeline.clone())),
            Box::new(InProcessStrategy::new(config.clone())),
            vec![config.paths.cleaned_table.clone(), config.paths.model.clone()],
            observer,
        )
    }

    fn missing(&self) -> Vec<PathBuf> {
        let expected: Vec<&std::path::Path> = self.expected.iter().map(PathBuf::as_path).collect();
        missing_artifacts(&expected)
    }

    /// Run the pipeline.
    ///
    /// With `raw_updated == false` and every artifact already present, nothing
    /// runs and the result is `Success` via `Primary`.
    pub fn run(&self, raw_updated: bool) -> PipelineResult {
        let mut states = vec![PipelineState::Idle];

        if !raw_updated && self.missing().is_empty() {
            states.push(PipelineState::Success);
            return self.finish(PipelineResult {
                status: PipelineStatus::Success,
                via: PipelineVia::Primary,
                detail: "no new observations; artifacts up to date".into(),
                missing: Vec::new(),
                primary_error: None,
                metrics: None,
                states,
            });
        }

        states.push(PipelineState::RunningPrimary);
        info!(strategy = self.primary.name(), "running pipeline");
        let (outcome, via, primary_error) = match self.primary.run(self.observer.as_ref()) {
            Ok(outcome) => (Ok(outcome), PipelineVia::Primary, None),
            Err(err) => {
                self.report_failure(self.primary.as_ref(), &err);
                states.push(PipelineState::RunningFallback);
                info!(strategy = self.fallback.name(), "falling back");
                let attempt = self.fallback.run(self.observer.as_ref());
                (attempt, PipelineVia::Fallback, Some(err.to_string()))
            }
        };

        let missing = self.missing();
        let result = match outcome {
            Err(err) => {
                self.report_failure(self.fallback.as_ref(), &err);
                states.push(PipelineState::Failed);
                PipelineResult {
                    status: PipelineStatus::Failed,
                    via,
                    detail: err.to_string(),
                    missing,
                    primary_error,
                    metrics: None,
                    states,
                }
            }
            Ok(outcome) => {
                states.push(PipelineState::Success);
                let (status, detail) = if missing.is_empty() {
                    (PipelineStatus::Success, outcome.detail)
                } else {
                    let names: Vec<String> = missing.iter().map(|p| p.display().to_string()).collect();
                    (
                        PipelineStatus::Partial,
                        format!("pipeline completed but some files are missing: {}", names.join(", ")),
                    )
                };
                PipelineResult {
                    status,
                    via,
                    detail,
                    missing,
                    primary_error,
                    metrics: outcome.metrics,
                    states,
                }
            }
        };
        self.finish(result)
    }

    fn report_failure(&self, strategy: &dyn PipelineStrategy, err: &StrategyError) {
        warn!(strategy = strategy.name(), error = %err, "pipeline strategy did not complete");
        self.observer.on_event(&PipelineEvent::StrategyFailed {
            strategy: strategy.name().to_string(),
            reason: err.to_string(),
        });
    }

    fn finish(&self, result: PipelineResult) -> PipelineResult {
        self.observer.on_event(&PipelineEvent::PipelineFinished {
            status: result.status,
            via: result.via,
        });
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::InMemoryObserver;
    use crate::strategy::StrategyOutcome;
    use std::fs;
    use std::path::Path;

    /// Writes the given files, or fails with the given error.
    struct FakeStrategy {
        name: &'static str,
        writes: Vec<PathBuf>,
        error: Option<fn() -> StrategyError>,
    }

    impl PipelineStrategy for FakeStrategy {
        fn name(&self) -> &str {
            self.name
        }

        fn run(&self, _observer: &dyn PipelineObserver) -> Result<StrategyOutcome, StrategyError> {
            if let Some(make) = self.error {
                return Err(make());
            }
            for path in &self.writes {
                fs::write(path, "ok").unwrap();
            }
            Ok(StrategyOutcome {
                detail: format!("{} done", self.name),
                metrics: None,
            })
        }
    }

    fn unavailable() -> StrategyError {
        StrategyError::Unavailable {
            strategy: "fake".into(),
            reason: "not installed".into(),
        }
    }

    fn failed() -> StrategyError {
        StrategyError::Failed {
            strategy: "fake".into(),
            reason: "boom".into(),
        }
    }

    fn artifacts(dir: &Path) -> Vec<PathBuf> {
        vec![dir.join("cleaned.csv"), dir.join("model.json")]
    }

    fn orchestrator(
        primary: FakeStrategy,
        fallback: FakeStrategy,
        dir: &Path,
    ) -> (PipelineOrchestrator, Arc<InMemoryObserver>) {
        let observer = Arc::new(InMemoryObserver::new());
        let orch = PipelineOrchestrator::new(
            Box::new(primary),
            Box::new(fallback),
            artifacts(dir),
            observer.clone(),
        );
        (orch, observer)
    }

    #[test]
    fn primary_success_with_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let (orch, _) = orchestrator(
            FakeStrategy { name: "primary", writes: artifacts(dir.path()), error: None },
            FakeStrategy { name: "fallback", writes: vec![], error: Some(failed) },
            dir.path(),
        );
        let result = orch.run(true);
        assert_eq!(result.status, PipelineStatus::Success);
        assert_eq!(result.via, PipelineVia::Primary);
        assert_eq!(
            result.states,
            vec![PipelineState::Idle, PipelineState::RunningPrimary, PipelineState::Success]
        );
    }

    #[test]
    fn unavailable_primary_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let (orch, observer) = orchestrator(
            FakeStrategy { name: "primary", writes: vec![], error: Some(unavailable) },
            FakeStrategy { name: "fallback", writes: artifacts(dir.path()), error: None },
            dir.path(),
        );
        let result = orch.run(true);
        assert_eq!(result.status, PipelineStatus::Success);
        assert_eq!(result.via, PipelineVia::Fallback);
        assert!(result.primary_error.unwrap().contains("not installed"));
        assert_eq!(
            result.states,
            vec![
                PipelineState::Idle,
                PipelineState::RunningPrimary,
                PipelineState::RunningFallback,
                PipelineState::Success
            ]
        );
        assert_eq!(observer.snapshot().strategy_failures, 1);
    }

    #[test]
    fn both_failing_is_failed() {
        let dir = tempfile::tempdir().unwrap();
        let (orch, observer) = orchestrator(
            FakeStrategy { name: "primary", writes: vec![], error: Some(failed) },
            FakeStrategy { name: "fallback", writes: vec![], error: Some(failed) },
            dir.path(),
        );
        let result = orch.run(true);
        assert_eq!(result.status, PipelineStatus::Failed);
        assert_eq!(result.via, PipelineVia::Fallback);
        assert_eq!(result.states.last(), Some(&PipelineState::Failed));
        assert_eq!(result.missing.len(), 2);
        assert_eq!(observer.snapshot().pipeline_failures, 1);
    }

    #[test]
    fn missing_artifact_without_error_is_partial() {
        let dir = tempfile::tempdir().unwrap();
        let only_cleaned = vec![dir.path().join("cleaned.csv")];
        let (orch, _) = orchestrator(
            FakeStrategy { name: "primary", writes: only_cleaned, error: None },
            FakeStrategy { name: "fallback", writes: vec![], error: Some(failed) },
            dir.path(),
        );
        let result = orch.run(true);
        assert_eq!(result.status, PipelineStatus::Partial);
        assert_eq!(result.via, PipelineVia::Primary);
        assert_eq!(result.missing, vec![dir.path().join("model.json")]);
        assert!(result.detail.contains("model.json"));
    }

    #[test]
    fn not_updated_with_artifacts_skips_run() {
        let dir = tempfile::tempdir().unwrap();
        for path in artifacts(dir.path()) {
            fs::write(path, "old").unwrap();
        }
        let (orch, _) = orchestrator(
            FakeStrategy { name: "primary", writes: vec![], error: Some(failed) },
            FakeStrategy { name: "fallback", writes: vec![], error: Some(failed) },
            dir.path(),
        );
        let result = orch.run(false);
        assert_eq!(result.status, PipelineStatus::Success);
        assert_eq!(result.states, vec![PipelineState::Idle, PipelineState::Success]);
    }

    #[test]
    fn not_updated_but_missing_artifacts_still_runs() {
        let dir = tempfile::tempdir().unwrap();
        let (orch, _) = orchestrator(
            FakeStrategy { name: "primary", writes: artifacts(dir.path()), error: None },
            FakeStrategy { name: "fallback", writes: vec![], error: Some(failed) },
            dir.path(),
        );
        let result = orch.run(false);
        assert_eq!(result.status, PipelineStatus::Success);
        assert!(result.states.contains(&PipelineState::RunningPrimary));
    }
}
