//! End-to-end flow over the fixture files: ingest → store → clean → features
//! → train → persist → reload → forecast.

use std::path::PathBuf;

use chrono::NaiveDate;
use weatherops_core::data::{ingest_csv, DataError, ObservationStore, SchemaError};
use weatherops_core::domain::{AVG_TEMP, MEASUREMENT_COLUMNS, WIND_SPEED};
use weatherops_core::model::{load_metrics, load_model, save_metrics, save_model, Trainer, TrainerConfig};
use weatherops_core::{Cleaner, FeatureBuilder, LagSpec, RecursiveForecaster};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn store_in(dir: &tempfile::TempDir) -> ObservationStore {
    ObservationStore::new(dir.path().join("raw_weather.csv"), dir.path().join("raw_weather.lock"))
}

#[test]
fn ingest_accepts_meteostat_names() {
    let observations = ingest_csv(&fixture("raw_weather.csv")).unwrap();
    assert_eq!(observations.len(), 40);
    assert_eq!(observations[0].timestamp, NaiveDate::from_ymd_opt(2023, 3, 1).unwrap());
    assert_eq!(observations[0].avg_temp, Some(26.0));
    assert_eq!(observations[0].wind_speed, None);
    assert!(observations[0].extra.contains_key("pres"));
}

#[test]
fn upload_missing_columns_is_rejected_with_names() {
    let err = ingest_csv(&fixture("missing_columns.csv")).unwrap_err();
    match err {
        DataError::Schema(SchemaError::MissingColumns(missing)) => {
            assert_eq!(missing, vec!["max_temp".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn overlapping_uploads_do_not_duplicate_timestamps() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);

    let first = store.upsert(&ingest_csv(&fixture("raw_weather.csv")).unwrap()).unwrap();
    assert_eq!((first.added, first.replaced, first.total), (40, 0, 40));

    let delta = ingest_csv(&fixture("upload_delta.csv")).unwrap();
    let second = store.upsert(&delta).unwrap();
    assert_eq!((second.added, second.replaced, second.total), (5, 5, 45));

    // Repeating the same upload is a no-op on content.
    let before = store.load().unwrap();
    let third = store.upsert(&delta).unwrap();
    assert_eq!((third.added, third.total), (0, 45));
    assert_eq!(store.load().unwrap(), before);

    let stored = store.load().unwrap();
    assert!(stored.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    // Incoming rows win on overlap.
    let overlap = NaiveDate::from_ymd_opt(2023, 4, 5).unwrap();
    let row = stored.iter().find(|o| o.timestamp == overlap).unwrap();
    assert_eq!(row.wind_speed, Some(10.5));
}

#[test]
fn full_core_pipeline_produces_forecast() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    store.upsert(&ingest_csv(&fixture("raw_weather.csv")).unwrap()).unwrap();

    let (cleaned, report) = Cleaner::new().clean(&store.load().unwrap()).unwrap();
    assert_eq!(cleaned.height(), 40);
    assert_eq!(report.output_rows, 40);
    for column in MEASUREMENT_COLUMNS {
        assert!(cleaned.values(column).unwrap().iter().all(Option::is_some), "{column} has nulls");
    }
    for dropped in ["snow", "wdir", "wpgt", "pres", "tsun"] {
        assert!(!cleaned.has_column(dropped));
    }
    let wind = cleaned.values(WIND_SPEED).unwrap();
    assert_eq!(wind[0], cleaned.median(WIND_SPEED));

    let cleaned_path = dir.path().join("cleaned_weather.csv");
    cleaned.save(&cleaned_path).unwrap();
    let cleaned = weatherops_core::CleanedTable::load(&cleaned_path).unwrap();

    let matrix = FeatureBuilder::build(&cleaned, &LagSpec::default()).unwrap();
    assert_eq!(matrix.height(), 37);

    let (model, metrics) = Trainer::new(TrainerConfig::default()).fit(&matrix).unwrap();
    let model_path = dir.path().join("model.json");
    let metrics_path = dir.path().join("metrics.json");
    save_model(&model, &model_path).unwrap();
    save_metrics(&metrics, &metrics_path).unwrap();

    let model = load_model(&model_path).unwrap();
    assert_eq!(load_metrics(&metrics_path).unwrap(), metrics);
    assert_eq!(model.target, AVG_TEMP);

    let forecast = RecursiveForecaster::forecast(&cleaned, &model, 3).unwrap();
    let dates: Vec<NaiveDate> = forecast.steps.iter().map(|s| s.date).collect();
    assert_eq!(
        dates,
        vec![
            NaiveDate::from_ymd_opt(2023, 4, 10).unwrap(),
            NaiveDate::from_ymd_opt(2023, 4, 11).unwrap(),
            NaiveDate::from_ymd_opt(2023, 4, 12).unwrap(),
        ]
    );
    assert!(forecast.steps.iter().all(|s| s.value.is_finite()));
}

#[test]
fn lag_configuration_must_match_at_inference() {
    let observations = ingest_csv(&fixture("raw_weather.csv")).unwrap();
    let (cleaned, _) = Cleaner::new().clean(&observations).unwrap();

    let matrix = FeatureBuilder::build(&cleaned, &LagSpec::default()).unwrap();
    let (model, _) = Trainer::new(TrainerConfig::default()).fit(&matrix).unwrap();

    let short = LagSpec::new(LagSpec::default().base_features, 2);
    let other = FeatureBuilder::build(&cleaned, &short).unwrap();
    let err = weatherops_core::validate(&model.feature_names, &other.columns()).unwrap_err();
    assert!(err.to_string().contains("avg_temp_t-3"));
    assert!(!model.matches_config(&short, AVG_TEMP));
}
