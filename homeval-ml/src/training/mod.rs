//! Training: ridge regression, metrics, model artifact, local run tracking.

pub mod experiment;
pub mod linear;
pub mod metrics;
pub mod model_store;
pub mod runner;

pub use experiment::{ExperimentRun, ExperimentTracker, RunStatus};
pub use linear::{LinearModel, RidgeRegression};
pub use metrics::RegressionMetrics;
pub use model_store::{MODEL_FORMAT_VERSION, TrainedModel, load_model, save_model};
pub use runner::{split_indices, train_model};
