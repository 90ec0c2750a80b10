//! Observation ingestion, persistence and fetching

pub mod frame;
pub mod ingest;
pub mod open_meteo;
pub mod provider;
pub mod schema;
pub mod store;

pub use ingest::{ingest_csv, observations_from_frame, validate_non_negative};
pub use open_meteo::{OpenMeteoProvider, OpenMeteoSettings};
pub use provider::{DataError, DataSource, FetchResult, ObservationProvider};
pub use schema::{ObservationSchema, SchemaError};
pub use store::{merge, MergeOutcome, ObservationStore, StoreLock};
