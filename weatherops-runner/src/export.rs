//! Forecast export: CSV for spreadsheets, JSON for other tools.

use std::path::Path;

use anyhow::{Context, Result};
use weatherops_core::ForecastStep;

// ─── CSV export ─────────────────────────────────────────────────────

/// Columns: day, date, `target`, description, precipitation, wind_speed
pub fn export_forecast_csv(steps: &[ForecastStep], target: &str) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "day",
        "date",
        target,
        "description",
        "precipitation",
        "wind_speed",
    ])?;

    for s in steps {
        wtr.write_record([
            &s.day.to_string(),
            &s.date.to_string(),
            &format!("{:.2}", s.value),
            s.description.label(),
            &format!("{:.2}", s.precipitation),
            &format!("{:.2}", s.wind_speed),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn write_forecast_csv(steps: &[ForecastStep], target: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let csv = export_forecast_csv(steps, target)?;
    std::fs::write(path, csv).with_context(|| format!("failed to write {}", path.display()))
}

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_forecast_json(steps: &[ForecastStep]) -> Result<String> {
    serde_json::to_string_pretty(steps).context("failed to serialize forecast to JSON")
}
