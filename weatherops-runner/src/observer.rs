//! Injected observability for the pipeline.
//!
//! Components report what happened through a `PipelineObserver` instead of
//! touching process-wide counters. `TracingObserver` forwards events to
//! `tracing`; `InMemoryObserver` records them for tests and run summaries.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use weatherops_core::model::Metrics;

use crate::orchestrator::{PipelineStatus, PipelineVia};
use crate::strategy::PipelineStep;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictionKind {
    NextDay,
    Horizon,
    Manual,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    UploadReceived { rows: usize },
    UploadStored { added: usize, replaced: usize, total: usize },
    StepCompleted { step: PipelineStep, rows: usize },
    TrainingCompleted { duration: Duration, metrics: Metrics },
    StrategyFailed { strategy: String, reason: String },
    PipelineFinished { status: PipelineStatus, via: PipelineVia },
    PredictionServed { kind: PredictionKind, days: usize, latency: Duration },
}

pub trait PipelineObserver: Send + Sync {
    fn on_event(&self, event: &PipelineEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {
    fn on_event(&self, _event: &PipelineEvent) {}
}

/// Emits each event as a structured `tracing` record.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::UploadReceived { rows } => info!(rows, "upload received"),
            PipelineEvent::UploadStored { added, replaced, total } => {
                info!(added, replaced, total, "upload stored")
            }
            PipelineEvent::StepCompleted { step, rows } => info!(%step, rows, "pipeline step completed"),
            PipelineEvent::TrainingCompleted { duration, metrics } => info!(
                time = format!("{:.2}s", duration.as_secs_f64()),
                mae = metrics.mae,
                rmse = metrics.rmse,
                samples = metrics.training_sample_count,
                "training completed"
            ),
            PipelineEvent::StrategyFailed { strategy, reason } => {
                warn!(strategy = %strategy, reason = %reason, "pipeline strategy failed")
            }
            PipelineEvent::PipelineFinished { status, via } => {
                info!(status = ?status, via = ?via, "pipeline finished")
            }
            PipelineEvent::PredictionServed { kind, days, latency } => info!(
                kind = ?kind,
                days,
                latency_ms = latency.as_millis() as u64,
                "prediction served"
            ),
        }
    }
}

/// Aggregate counters derived from recorded events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObserverSnapshot {
    pub uploads: usize,
    pub rows_stored: usize,
    pub training_runs: usize,
    pub strategy_failures: usize,
    pub pipeline_runs: usize,
    pub pipeline_failures: usize,
    pub predictions: usize,
}

/// Records every event in memory.
#[derive(Debug, Default)]
pub struct InMemoryObserver {
    events: Mutex<Vec<PipelineEvent>>,
}

impl InMemoryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn snapshot(&self) -> ObserverSnapshot {
        let mut snap = ObserverSnapshot::default();
        for event in self.events.lock().unwrap_or_else(PoisonError::into_inner).iter() {
            match event {
                PipelineEvent::UploadReceived { .. } => snap.uploads += 1,
                PipelineEvent::UploadStored { added, replaced, .. } => {
                    snap.rows_stored += added + replaced
                }
                PipelineEvent::StepCompleted { .. } => {}
                PipelineEvent::TrainingCompleted { .. } => snap.training_runs += 1,
                PipelineEvent::StrategyFailed { .. } => snap.strategy_failures += 1,
                PipelineEvent::PipelineFinished { status, .. } => {
                    snap.pipeline_runs += 1;
                    if *status == PipelineStatus::Failed {
                        snap.pipeline_failures += 1;
                    }
                }
                PipelineEvent::PredictionServed { .. } => snap.predictions += 1,
            }
        }
        snap
    }
}

impl PipelineObserver for InMemoryObserver {
    fn on_event(&self, event: &PipelineEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

/// Forwards every event to each inner observer in order.
pub struct FanoutObserver {
    inner: Vec<Box<dyn PipelineObserver>>,
}

impl FanoutObserver {
    pub fn new(inner: Vec<Box<dyn PipelineObserver>>) -> Self {
        Self { inner }
    }
}

impl PipelineObserver for FanoutObserver {
    fn on_event(&self, event: &PipelineEvent) {
        for observer in &self.inner {
            observer.on_event(event);
        }
    }
}

impl<T: PipelineObserver + ?Sized> PipelineObserver for std::sync::Arc<T> {
    fn on_event(&self, event: &PipelineEvent) {
        (**self).on_event(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn in_memory_counts_events() {
        let observer = InMemoryObserver::new();
        observer.on_event(&PipelineEvent::UploadReceived { rows: 3 });
        observer.on_event(&PipelineEvent::UploadStored { added: 2, replaced: 1, total: 10 });
        observer.on_event(&PipelineEvent::PipelineFinished {
            status: PipelineStatus::Failed,
            via: PipelineVia::Fallback,
        });

        let snap = observer.snapshot();
        assert_eq!(snap.uploads, 1);
        assert_eq!(snap.rows_stored, 3);
        assert_eq!(snap.pipeline_runs, 1);
        assert_eq!(snap.pipeline_failures, 1);
        assert_eq!(observer.events().len(), 3);
    }

    #[test]
    fn fanout_reaches_every_observer() {
        let a = Arc::new(InMemoryObserver::new());
        let b = Arc::new(InMemoryObserver::new());
        let fanout = FanoutObserver::new(vec![Box::new(a.clone()), Box::new(b.clone())]);

        fanout.on_event(&PipelineEvent::UploadReceived { rows: 1 });
        assert_eq!(a.snapshot().uploads, 1);
        assert_eq!(b.snapshot().uploads, 1);
    }

    #[test]
    fn tracing_and_noop_accept_all_events() {
        let event = PipelineEvent::PredictionServed {
            kind: PredictionKind::Manual,
            days: 1,
            latency: Duration::from_millis(3),
        };
        TracingObserver.on_event(&event);
        NoopObserver.on_event(&event);
    }
}
