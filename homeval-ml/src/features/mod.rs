//! Feature engineering: derivation, fitted state, transformation and storage.

pub mod derive;
pub mod matrix;
pub mod state;
pub mod store;
pub mod transformer;

pub use derive::{DerivedColumns, derive_columns};
pub use matrix::{FeatureMatrix, TargetColumn};
pub use state::{CategoryEncoding, FittedTransformerState, NumericStats, UNKNOWN_CODE, UNKNOWN_LEVEL};
pub use transformer::{DriftReport, FeatureTransformer};
