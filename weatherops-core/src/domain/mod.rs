//! Domain types: daily observations and the canonical column vocabulary.

pub mod observation;

pub use observation::{
    Observation, AVG_TEMP, MAX_TEMP, MEASUREMENT_COLUMNS, MIN_TEMP, PRECIPITATION,
    REQUIRED_COLUMNS, TEMPERATURE_COLUMNS, TIMESTAMP, WIND_SPEED,
};
