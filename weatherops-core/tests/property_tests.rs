//! Property tests for store merging and lag feature construction.

use chrono::{Days, NaiveDate};
use polars::prelude::*;
use proptest::prelude::*;
use std::collections::BTreeSet;

use weatherops_core::data::merge;
use weatherops_core::domain::Observation;
use weatherops_core::{CleanedTable, FeatureBuilder, LagSpec};

fn day(offset: u16) -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + Days::new(offset as u64)
}

fn arb_observations() -> impl Strategy<Value = Vec<Observation>> {
    prop::collection::vec((0u16..60, -5.0f64..40.0), 0..40).prop_map(|rows| {
        rows.into_iter()
            .map(|(offset, temp)| {
                let mut obs = Observation::empty(day(offset));
                obs.avg_temp = Some(temp);
                obs
            })
            .collect()
    })
}

fn complete_table(temps: &[f64]) -> CleanedTable {
    let dates: Vec<String> = (0..temps.len()).map(|i| day(i as u16).to_string()).collect();
    let df = df!(
        "timestamp" => dates,
        "avg_temp" => temps.to_vec(),
        "min_temp" => temps.iter().map(|t| t - 3.0).collect::<Vec<_>>(),
        "max_temp" => temps.iter().map(|t| t + 3.0).collect::<Vec<_>>(),
        "precipitation" => vec![0.0; temps.len()],
        "wind_speed" => vec![5.0; temps.len()],
    )
    .unwrap();
    CleanedTable::from_frame(df).unwrap()
}

proptest! {
    #[test]
    fn merge_has_union_of_timestamps_sorted(s in arb_observations(), d in arb_observations()) {
        let merged = merge(&s, &d);
        let expected: BTreeSet<NaiveDate> =
            s.iter().chain(d.iter()).map(|o| o.timestamp).collect();
        let got: Vec<NaiveDate> = merged.iter().map(|o| o.timestamp).collect();
        prop_assert_eq!(got, expected.into_iter().collect::<Vec<_>>());
    }

    #[test]
    fn merge_is_idempotent(s in arb_observations(), d in arb_observations()) {
        let once = merge(&s, &d);
        prop_assert_eq!(merge(&once, &d), once.clone());
        prop_assert_eq!(merge(&s, &once), once);
    }

    #[test]
    fn incoming_wins_on_conflict(s in arb_observations(), d in arb_observations()) {
        let merged = merge(&s, &d);
        for obs in &merged {
            if let Some(last) = d.iter().rev().find(|o| o.timestamp == obs.timestamp) {
                prop_assert_eq!(obs, last);
            }
        }
    }

    #[test]
    fn feature_build_is_deterministic(
        temps in prop::collection::vec(-5.0f64..40.0, 0..30),
        lags in 1usize..5,
    ) {
        let table = complete_table(&temps);
        let spec = LagSpec::new(LagSpec::default().base_features, lags);
        let a = FeatureBuilder::build(&table, &spec).unwrap();
        let b = FeatureBuilder::build(&table, &spec).unwrap();

        prop_assert_eq!(a.columns(), b.columns());
        prop_assert!(a.frame().equals_missing(b.frame()));
        prop_assert_eq!(a.height(), temps.len().saturating_sub(lags));
    }
}
