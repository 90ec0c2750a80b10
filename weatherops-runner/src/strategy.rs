//! Pipeline execution strategies.
//!
//! Two variants share the `PipelineStrategy` capability:
//! - `DeclarativeStrategy`: shells out to an external pipeline runner
//!   (`dvc repro` by default) that owns the clean/train stages.
//! - `InProcessStrategy`: runs Cleaner → FeatureBuilder → Trainer directly,
//!   step by step, stopping at the first failing step.

use std::fmt;
use std::io;
use std::process::Command;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use weatherops_core::data::DataError;
use weatherops_core::model::{
    save_metrics, save_model, ArtifactError, Metrics, TrainedModel, Trainer, TrainingError,
};
use weatherops_core::{CleanedTable, Cleaner, FeatureBuilder, FeatureError};

use crate::config::{PipelineConfig, WeatherOpsConfig};
use crate::observer::{PipelineEvent, PipelineObserver};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStep {
    Clean,
    BuildFeatures,
    Train,
    Persist,
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Clean => "clean",
            Self::BuildFeatures => "build_features",
            Self::Train => "train",
            Self::Persist => "persist",
        };
        f.write_str(name)
    }
}

/// Failure inside one in-process step.
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    Training(#[from] TrainingError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

#[derive(Debug, Error)]
pub enum StrategyError {
    /// The mechanism is not installed, not initialized, or disabled.
    #[error("{strategy} strategy unavailable: {reason}")]
    Unavailable { strategy: String, reason: String },

    #[error("{strategy} strategy failed: {reason}")]
    Failed { strategy: String, reason: String },

    #[error("step '{step}' failed: {source}")]
    StepFailed {
        step: PipelineStep,
        #[source]
        source: StepError,
    },
}

impl StrategyError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// What a successful strategy run reports back.
#[derive(Debug, Clone, Default)]
pub struct StrategyOutcome {
    pub detail: String,
    /// Present when the strategy trained in-process.
    pub metrics: Option<Metrics>,
}

pub trait PipelineStrategy: Send + Sync {
    fn name(&self) -> &str;

    fn run(&self, observer: &dyn PipelineObserver) -> Result<StrategyOutcome, StrategyError>;
}

// ─── Declarative ────────────────────────────────────────────────────

pub struct DeclarativeStrategy {
    config: PipelineConfig,
}

impl DeclarativeStrategy {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    fn unavailable(&self, reason: impl Into<String>) -> StrategyError {
        StrategyError::Unavailable {
            strategy: self.name().to_string(),
            reason: reason.into(),
        }
    }

    /// Initialize the runner's workspace when its marker is absent.
    fn ensure_initialized(&self) -> Result<(), StrategyError> {
        let marker = self.config.workdir.join(&self.config.init_marker);
        if self.config.init_marker.is_empty() || marker.exists() {
            return Ok(());
        }
        let Some((program, args)) = self.config.init_command.split_first() else {
            return Err(self.unavailable(format!("{} is missing and no init command is set", marker.display())));
        };
        info!(command = %self.config.init_command.join(" "), "initializing pipeline workspace");
        self.exec(program, args)
    }

    fn exec(&self, program: &str, args: &[String]) -> Result<(), StrategyError> {
        let output = Command::new(program)
            .args(args)
            .current_dir(&self.config.workdir)
            .output()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => self.unavailable(format!("'{program}' is not installed")),
                _ => self.unavailable(format!("cannot start '{program}': {e}")),
            })?;

        if output.status.success() {
            debug!(program, "pipeline command succeeded");
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
        let tail: Vec<&str> = tail.into_iter().rev().collect();
        Err(StrategyError::Failed {
            strategy: self.name().to_string(),
            reason: format!("'{program}' exited with {}: {}", output.status, tail.join(" | ")),
        })
    }
}

impl PipelineStrategy for DeclarativeStrategy {
    fn name(&self) -> &str {
        "declarative"
    }

    fn run(&self, _observer: &dyn PipelineObserver) -> Result<StrategyOutcome, StrategyError> {
        if !self.config.enabled {
            return Err(self.unavailable("disabled in configuration"));
        }
        self.ensure_initialized()?;
        self.exec(&self.config.command, &self.config.args)?;
        Ok(StrategyOutcome {
            detail: format!("{} {} completed", self.config.command, self.config.args.join(" ")),
            metrics: None,
        })
    }
}

// ─── In-process ─────────────────────────────────────────────────────

pub struct InProcessStrategy {
    config: WeatherOpsConfig,
}

impl InProcessStrategy {
    pub fn new(config: WeatherOpsConfig) -> Self {
        Self { config }
    }

    /// Clean the stored observations and persist the cleaned table.
    pub fn clean(&self, observer: &dyn PipelineObserver) -> Result<CleanedTable, StrategyError> {
        let step = |source: StepError| StrategyError::StepFailed {
            step: PipelineStep::Clean,
            source,
        };
        let observations = self.config.store().load().map_err(|e| step(e.into()))?;
        let (cleaned, report) = Cleaner::new().clean(&observations).map_err(|e| step(e.into()))?;
        cleaned
            .save(&self.config.paths.cleaned_table)
            .map_err(|e| step(e.into()))?;

        observer.on_event(&PipelineEvent::StepCompleted {
            step: PipelineStep::Clean,
            rows: report.output_rows,
        });
        debug!(
            input = report.input_rows,
            output = report.output_rows,
            filled = report.filled_values,
            "cleaned observations"
        );
        Ok(cleaned)
    }

    /// Build features from `cleaned`, train, and persist model and metrics.
    pub fn train(
        &self,
        cleaned: &CleanedTable,
        observer: &dyn PipelineObserver,
    ) -> Result<(TrainedModel, Metrics), StrategyError> {
        let matrix = FeatureBuilder::build(cleaned, &self.config.lag_spec()).map_err(|e| {
            StrategyError::StepFailed {
                step: PipelineStep::BuildFeatures,
                source: e.into(),
            }
        })?;
        observer.on_event(&PipelineEvent::StepCompleted {
            step: PipelineStep::BuildFeatures,
            rows: matrix.height(),
        });

        let started = Instant::now();
        let (model, metrics) = Trainer::new(self.config.trainer_config())
            .fit(&matrix)
            .map_err(|e| StrategyError::StepFailed {
                step: PipelineStep::Train,
                source: e.into(),
            })?;
        observer.on_event(&PipelineEvent::TrainingCompleted {
            duration: started.elapsed(),
            metrics: metrics.clone(),
        });

        let persist = |source: ArtifactError| StrategyError::StepFailed {
            step: PipelineStep::Persist,
            source: source.into(),
        };
        save_model(&model, &self.config.paths.model).map_err(persist)?;
        save_metrics(&metrics, &self.config.paths.metrics).map_err(persist)?;
        Ok((model, metrics))
    }
}

impl PipelineStrategy for InProcessStrategy {
    fn name(&self) -> &str {
        "in-process"
    }

    fn run(&self, observer: &dyn PipelineObserver) -> Result<StrategyOutcome, StrategyError> {
        let cleaned = self.clean(observer)?;
        let (_, metrics) = self.train(&cleaned, observer)?;
        Ok(StrategyOutcome {
            detail: format!(
                "cleaned {} rows, trained on {} samples (mae {:.2}, rmse {:.2})",
                cleaned.height(),
                metrics.training_sample_count,
                metrics.mae,
                metrics.rmse
            ),
            metrics: Some(metrics),
        })
    }
}
