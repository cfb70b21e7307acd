//! Regression metrics.

use crate::error::MlError;
use serde::{Deserialize, Serialize};

/// Held-out evaluation of a regression model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub r_squared: f64,
    pub samples: usize,
}

impl RegressionMetrics {
    pub fn compute(y_true: &[f64], y_pred: &[f64]) -> Result<Self, MlError> {
        if y_true.is_empty() {
            return Err(MlError::training("cannot evaluate on zero rows"));
        }
        if y_true.len() != y_pred.len() {
            return Err(MlError::training(format!(
                "{} targets but {} predictions",
                y_true.len(),
                y_pred.len()
            )));
        }
        let n = y_true.len() as f64;
        let mean = y_true.iter().sum::<f64>() / n;
        let (mut ss_res, mut abs, mut ss_tot) = (0.0, 0.0, 0.0);
        for (t, p) in y_true.iter().zip(y_pred) {
            ss_res += (t - p).powi(2);
            abs += (t - p).abs();
            ss_tot += (t - mean).powi(2);
        }
        let mse = ss_res / n;
        // A constant target only earns a perfect score with exact predictions.
        let r_squared = match (ss_tot == 0.0, ss_res == 0.0) {
            (true, true) => 1.0,
            (true, false) => 0.0,
            _ => 1.0 - ss_res / ss_tot,
        };
        Ok(Self {
            mse,
            rmse: mse.sqrt(),
            mae: abs / n,
            r_squared,
            samples: y_true.len(),
        })
    }

    /// Metric name/value pairs for tracking.
    pub fn as_pairs(&self) -> [(&'static str, f64); 4] {
        [
            ("mse", self.mse),
            ("rmse", self.rmse),
            ("mae", self.mae),
            ("r2", self.r_squared),
        ]
    }
}
