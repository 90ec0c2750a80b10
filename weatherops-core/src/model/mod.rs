//! Predictors, training and persisted model artifacts.

pub mod artifact;
pub mod persistence;
pub mod regressor;
pub mod ridge;
pub mod trainer;

pub use artifact::{load_metrics, load_model, missing_artifacts, save_metrics, save_model, ArtifactError};
pub use persistence::PersistenceRegressor;
pub use regressor::{ModelKind, Predictor, Regressor};
pub use ridge::RidgeRegressor;
pub use trainer::{
    split_sizes, Metrics, TrainedModel, Trainer, TrainerConfig, TrainingError, MODEL_FORMAT_VERSION,
};
