//! # homeval-ml: house price feature pipeline
//!
//! Raw housing data flows through four stages that share one column
//! derivation so training and serving can never disagree:
//!
//! 1. **Schema validation** ([`data::validate_batch`]) checks columns and
//!    primitive types before anything is transformed.
//! 2. **Cleaning** ([`data::clean`]) drops rows with missing, out-of-domain,
//!    impossible or duplicate values and reports counts per reason.
//! 3. **Feature transformation** ([`features::FeatureTransformer`]) fits
//!    scaling statistics and category encodings, then replays them.
//! 4. **Transformer store** ([`features::store`]) persists the fitted state as
//!    a versioned, checksummed artifact.
//!
//! On top of those sit the training driver ([`training`]), the predictor and
//! HTTP router ([`inference`]) and file-level stage wrappers ([`pipeline`]).

mod artifact;
pub mod data;
pub mod error;
pub mod features;
pub mod inference;
pub mod pipeline;
pub mod training;

pub use error::MlError;
pub use features::{FeatureTransformer, FittedTransformerState};
pub use inference::Predictor;
pub use pipeline::{engineer_features, process_data, run_all, train};
