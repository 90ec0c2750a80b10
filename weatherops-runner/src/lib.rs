//! WeatherOps Runner: pipeline orchestration and services over `weatherops-core`.
//!
//! This crate provides:
//! - TOML configuration with defaults for every section
//! - Injected pipeline observers (tracing, in-memory)
//! - Declarative and in-process pipeline strategies
//! - Primary/fallback orchestration with artifact checks
//! - Upload/fetch ingestion that stores first and retrains second
//! - Next-day, multi-day and manual-input forecast serving
//! - Forecast export to CSV and JSON

pub mod config;
pub mod export;
pub mod ingest;
pub mod observer;
pub mod orchestrator;
pub mod serving;
pub mod strategy;

pub use config::{
    ConfigError, FeaturesConfig, ModelConfig, ModelName, PathsConfig, PipelineConfig,
    ProviderConfig, WeatherOpsConfig,
};
pub use export::{export_forecast_csv, export_forecast_json, write_forecast_csv};
pub use ingest::{IngestError, IngestReport, IngestService};
pub use observer::{
    FanoutObserver, InMemoryObserver, NoopObserver, ObserverSnapshot, PipelineEvent,
    PipelineObserver, PredictionKind, TracingObserver,
};
pub use orchestrator::{
    PipelineOrchestrator, PipelineResult, PipelineState, PipelineStatus, PipelineVia,
};
pub use serving::{ForecastService, ServeError, MAX_HORIZON_DAYS};
pub use strategy::{
    DeclarativeStrategy, InProcessStrategy, PipelineStep, PipelineStrategy, StepError,
    StrategyError, StrategyOutcome,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_is_send_sync() {
        assert_send::<WeatherOpsConfig>();
        assert_sync::<WeatherOpsConfig>();
    }

    #[test]
    fn services_are_send_sync() {
        assert_send::<PipelineOrchestrator>();
        assert_sync::<PipelineOrchestrator>();
        assert_send::<IngestService>();
        assert_sync::<IngestService>();
        assert_send::<ForecastService>();
        assert_sync::<ForecastService>();
    }

    #[test]
    fn results_are_send_sync() {
        assert_send::<PipelineResult>();
        assert_sync::<PipelineResult>();
        assert_send::<IngestReport>();
        assert_sync::<IngestReport>();
    }

    #[test]
    fn error_types_are_send_sync() {
        fn require<T: Send + Sync + 'static>() {}
        require::<ConfigError>();
        require::<StrategyError>();
        require::<IngestError>();
        require::<ServeError>();
    }
}
