//! WeatherOps CLI: ingestion, pipeline and forecast commands.
//!
//! Commands:
//! - `ingest`: merge an uploaded CSV into the store and retrain
//! - `fetch`: pull a date range from Open-Meteo, merge and retrain
//! - `pipeline`: run the primary/fallback pipeline over the current store
//! - `clean` / `train`: run one in-process stage
//! - `forecast`: recursive multi-day forecast, optionally exported as CSV
//! - `predict-manual`: forecast from manually entered recent temperatures
//! - `status`: store, artifact and metrics summary

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use weatherops_core::data::OpenMeteoProvider;
use weatherops_core::model::{load_metrics, Metrics};
use weatherops_core::{CleanedTable, ForecastStep};
use weatherops_runner::{
    export_forecast_json, write_forecast_csv, ForecastService, InProcessStrategy, IngestReport,
    IngestService, PipelineObserver, PipelineOrchestrator, PipelineResult, PipelineStatus,
    TracingObserver, WeatherOpsConfig,
};

#[derive(Parser)]
#[command(
    name = "weatherops",
    about = "WeatherOps CLI: daily weather ingestion, training and recursive forecasting"
)]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge an observation CSV into the store, then retrain.
    Ingest {
        /// CSV with timestamp, avg/min/max temperature, precipitation and wind speed.
        file: PathBuf,
    },
    /// Fetch observations from Open-Meteo, merge them, then retrain.
    Fetch {
        /// Start date (YYYY-MM-DD). Defaults to one year before --end.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD). Defaults to yesterday.
        #[arg(long)]
        end: Option<String>,
    },
    /// Run the pipeline over the current store.
    Pipeline {
        /// Run even when the cleaned table and model are already present.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Clean the stored observations in-process.
    Clean,
    /// Build features from the cleaned table and train in-process.
    Train,
    /// Forecast the next days from the cleaned table.
    Forecast {
        /// Number of days to forecast.
        #[arg(long, default_value_t = 3)]
        days: usize,

        /// Also write the forecast as CSV to this path.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Print JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Predict tomorrow's average temperature from recent values, oldest first.
    PredictManual {
        #[arg(required = true, num_args = 1.., allow_negative_numbers = true)]
        values: Vec<f64>,
    },
    /// Show the store, artifacts and last training metrics.
    Status,
}

fn main() -> ExitCode {
    init_tracing();
    match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weatherops_cli=info,weatherops_core=info,weatherops_runner=info".into()),
        )
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = WeatherOpsConfig::load_or_default(cli.config.as_deref())
        .context("failed to load configuration")?;
    let observer: Arc<dyn PipelineObserver> = Arc::new(TracingObserver);
    info!(config = ?cli.config, store = %config.paths.raw_store.display(), "configuration loaded");

    match cli.command {
        Commands::Ingest { file } => {
            let report = IngestService::new(config, observer).ingest_file(&file)?;
            Ok(print_ingest(&report))
        }
        Commands::Fetch { start, end } => run_fetch(config, observer, start, end),
        Commands::Pipeline { force } => {
            let result = PipelineOrchestrator::from_config(&config, observer).run(force);
            print_pipeline(&result);
            Ok(exit_for(result.status))
        }
        Commands::Clean => {
            let table = InProcessStrategy::new(config.clone()).clean(observer.as_ref())?;
            println!(
                "Cleaned {} rows -> {}",
                table.height(),
                config.paths.cleaned_table.display()
            );
            Ok(ExitCode::SUCCESS)
        }
        Commands::Train => {
            let table = CleanedTable::load(&config.paths.cleaned_table).with_context(|| {
                format!(
                    "cannot read {}; run `weatherops clean` first",
                    config.paths.cleaned_table.display()
                )
            })?;
            let (_, metrics) = InProcessStrategy::new(config.clone()).train(&table, observer.as_ref())?;
            print_metrics(&metrics);
            println!("Model saved to: {}", config.paths.model.display());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Forecast { days, csv, json } => {
            let forecast = ForecastService::new(config, observer).forecast(days)?;
            if json {
                println!("{}", export_forecast_json(&forecast.steps)?);
            } else {
                print_forecast(&forecast.steps);
            }
            if let Some(path) = csv {
                write_forecast_csv(&forecast.steps, &forecast.target, &path)?;
                info!(path = %path.display(), days = forecast.steps.len(), "forecast exported");
                println!("Forecast written to: {}", path.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::PredictManual { values } => {
            let result = ForecastService::new(config, observer).manual(&values)?;
            println!(
                "Predicted average temperature: {:.2} °C  {} {}",
                result.value,
                result.description.icon(),
                result.description
            );
            if !result.filled.is_empty() {
                println!("Filled from history: {}", result.filled.join(", "));
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Status => run_status(&config),
    }
}

fn run_fetch(
    config: WeatherOpsConfig,
    observer: Arc<dyn PipelineObserver>,
    start: Option<String>,
    end: Option<String>,
) -> Result<ExitCode> {
    let end_date = end
        .as_deref()
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()?
        .unwrap_or_else(|| chrono::Local::now().date_naive() - chrono::Duration::days(1));
    let start_date = start
        .as_deref()
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()?
        .unwrap_or_else(|| end_date - chrono::Duration::days(365));
    if start_date > end_date {
        bail!("--start {start_date} is after --end {end_date}");
    }

    let provider = OpenMeteoProvider::new(config.provider_settings())?;
    let report = IngestService::new(config, observer).fetch(&provider, start_date, end_date)?;
    Ok(print_ingest(&report))
}

fn run_status(config: &WeatherOpsConfig) -> Result<ExitCode> {
    let store = config.store();
    let observations = store.load()?;
    println!("Store:   {}", store.path().display());
    match (observations.first(), observations.last()) {
        (Some(first), Some(last)) => println!(
            "Rows:    {} ({} to {})",
            observations.len(),
            first.timestamp,
            last.timestamp
        ),
        _ => println!("Rows:    0"),
    }
    println!();
    for (label, path) in [
        ("Cleaned", &config.paths.cleaned_table),
        ("Model", &config.paths.model),
        ("Metrics", &config.paths.metrics),
    ] {
        println!("{label:<8} {} {}", presence(path), path.display());
    }
    if config.paths.metrics.is_file() {
        print_metrics(&load_metrics(&config.paths.metrics)?);
    }
    Ok(ExitCode::SUCCESS)
}

fn exit_for(status: PipelineStatus) -> ExitCode {
    match status {
        PipelineStatus::Success => ExitCode::SUCCESS,
        PipelineStatus::Partial | PipelineStatus::Failed => ExitCode::from(2),
    }
}

fn presence(path: &Path) -> &'static str {
    if path.is_file() {
        "[ok]     "
    } else {
        "[missing]"
    }
}

fn print_ingest(report: &IngestReport) -> ExitCode {
    println!(
        "Stored {} rows: {} added, {} replaced, {} total",
        report.merge.received, report.merge.added, report.merge.replaced, report.merge.total
    );
    print_pipeline(&report.pipeline);
    if report.is_warning() {
        println!("WARNING: {}", report.message);
    } else {
        println!("{}", report.message);
    }
    // Stored rows are never an error; only the pipeline outcome sets the code.
    exit_for(report.pipeline.status)
}

fn print_pipeline(result: &PipelineResult) {
    println!();
    println!("=== Pipeline ===");
    println!("Status:   {:?}", result.status);
    println!("Via:      {:?}", result.via);
    println!("Detail:   {}", result.detail);
    if let Some(err) = &result.primary_error {
        println!("Primary:  {err}");
    }
    if let Some(metrics) = &result.metrics {
        print_metrics(metrics);
    }
}

fn print_metrics(metrics: &Metrics) {
    println!();
    println!("--- Metrics ---");
    println!("Model:          {}", metrics.model);
    println!("MAE:            {:.2}", metrics.mae);
    println!("RMSE:           {:.2}", metrics.rmse);
    println!("Features:       {}", metrics.feature_count);
    println!(
        "Samples:        {} train / {} test",
        metrics.training_sample_count, metrics.test_sample_count
    );
    println!("Trained at:     {}", metrics.trained_at.format("%Y-%m-%d %H:%M:%S"));
}

fn print_forecast(steps: &[ForecastStep]) {
    println!();
    println!("{:<4} {:<12} {:>9}  {:<14}", "Day", "Date", "Avg °C", "Conditions");
    println!("{}", "-".repeat(44));
    for s in steps {
        println!(
            "{:<4} {:<12} {:>9.2}  {} {}",
            s.day,
            s.date,
            s.value,
            s.description.icon(),
            s.description
        );
    }
    println!();
}
