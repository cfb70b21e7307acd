//! Trained model artifact.

use crate::artifact::{read_versioned, write_versioned};
use crate::error::MlError;
use crate::training::linear::LinearModel;
use crate::training::metrics::RegressionMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const MODEL_FORMAT_VERSION: u32 = 1;

const PAYLOAD_KEY: &str = "model";

/// A trained model plus what is needed to audit it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub name: String,
    pub target: String,
    pub alpha: f64,
    pub model: LinearModel,
    pub metrics: RegressionMetrics,
    pub train_rows: usize,
    pub trained_at: DateTime<Utc>,
}

pub fn save_model(model: &TrainedModel, destination: &Path) -> Result<(), MlError> {
    write_versioned(destination, MODEL_FORMAT_VERSION, PAYLOAD_KEY, model)?;
    tracing::info!(path = %destination.display(), name = %model.name, "Saved model");
    Ok(())
}

pub fn load_model(source: &Path) -> Result<TrainedModel, MlError> {
    let model: TrainedModel = read_versioned(source, MODEL_FORMAT_VERSION, PAYLOAD_KEY)?;
    let lm = &model.model;
    if lm.weights.len() != lm.feature_columns.len() {
        return Err(MlError::corrupt(
            source,
            format!(
                "{} weights for {} feature columns",
                lm.weights.len(),
                lm.feature_columns.len()
            ),
        ));
    }
    if !lm.intercept.is_finite() || lm.weights.iter().any(|w| !w.is_finite()) {
        return Err(MlError::corrupt(source, "non-finite model parameters"));
    }
    Ok(model)
}
