//! Ridge regression solved through the normal equations.

use crate::error::MlError;
use ndarray::{Array1, Array2, ArrayView1, Axis, s};
use serde::{Deserialize, Serialize};

/// Pivots below this magnitude are treated as zero.
const PIVOT_EPS: f64 = 1e-12;

/// A fitted linear model over named feature columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub feature_columns: Vec<String>,
    pub weights: Vec<f64>,
    pub intercept: f64,
}

impl LinearModel {
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.intercept + self.weights.iter().zip(row).map(|(w, x)| w * x).sum::<f64>()
    }

    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        x.dot(&ArrayView1::from(self.weights.as_slice())) + self.intercept
    }

    /// Per-feature contribution `w * x` to a prediction.
    pub fn contributions<'a>(&'a self, row: &'a [f64]) -> impl Iterator<Item = (&'a str, f64)> + 'a {
        self.feature_columns
            .iter()
            .zip(self.weights.iter().zip(row))
            .map(|(name, (w, x))| (name.as_str(), w * x))
    }
}

/// L2-regularized least squares with an unpenalized intercept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RidgeRegression {
    pub alpha: f64,
}

impl RidgeRegression {
    pub fn new(alpha: f64) -> Self {
        Self { alpha }
    }

    /// Fit on the design matrix `x` (one row per sample) with targets `y`.
    ///
    /// Features and target are centred so the intercept stays out of the
    /// penalty. Columns with no variance get a zero weight.
    pub fn fit(
        &self,
        columns: &[String],
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<LinearModel, MlError> {
        let (n, p) = x.dim();
        if n == 0 {
            return Err(MlError::training("no training rows"));
        }
        if n != y.len() {
            return Err(MlError::training(format!(
                "{n} feature rows but {} targets",
                y.len()
            )));
        }
        if p != columns.len() {
            return Err(MlError::training(format!(
                "{p} feature values per row, expected {}",
                columns.len()
            )));
        }

        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| MlError::training("no training rows"))?;
        let y_mean = y.mean().unwrap_or(0.0);
        let x_centered = x - &x_mean.view().insert_axis(Axis(0));
        let y_centered = y - y_mean;

        let active: Vec<usize> = (0..p)
            .filter(|&j| x_centered.column(j).iter().any(|v| v.abs() > PIVOT_EPS))
            .collect();
        let x_active = x_centered.select(Axis(1), &active);

        let mut xtx = x_active.t().dot(&x_active);
        for i in 0..active.len() {
            xtx[[i, i]] += self.alpha;
        }
        let xty = x_active.t().dot(&y_centered);

        let solved = solve(xtx, xty).ok_or_else(|| {
            MlError::training("normal equations are singular; set model.alpha above 0")
        })?;

        let mut weights = Array1::<f64>::zeros(p);
        for (a, &j) in active.iter().enumerate() {
            weights[j] = solved[a];
        }
        let intercept = y_mean - weights.dot(&x_mean);

        tracing::debug!(
            rows = n,
            features = p,
            constant_features = p - active.len(),
            alpha = self.alpha,
            "Fitted ridge regression"
        );
        Ok(LinearModel {
            feature_columns: columns.to_vec(),
            weights: weights.to_vec(),
            intercept,
        })
    }
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))?;
        if a[[pivot, col]].abs() < PIVOT_EPS {
            return None;
        }
        if pivot != col {
            for c in 0..n {
                a.swap([col, c], [pivot, c]);
            }
            b.swap(col, pivot);
        }
        for row in col + 1..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for c in col..n {
                a[[row, c]] -= factor * a[[col, c]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let tail = a.slice(s![row, row + 1..]).dot(&x.slice(s![row + 1..]));
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    Some(x)
}
