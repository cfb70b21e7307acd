//! Fitted transformer state.
//!
//! The state is plain data: everything transform mode needs, nothing it has to
//! recompute. It is created once by [`FeatureTransformer::fit`] and is never
//! mutated afterwards; a new dataset means a new fit.
//!
//! [`FeatureTransformer::fit`]: crate::features::FeatureTransformer::fit

use crate::data::SchemaDefinition;
use crate::features::derive::{CATEGORICAL_FEATURES, LAYOUT, NUMERIC_FEATURES, Slot};
use homeval_core::{EncodingMethod, ScalingMethod};
use serde::{Deserialize, Serialize};

/// Ordinal code for a category not seen during fit.
pub const UNKNOWN_CODE: f64 = -1.0;

/// One-hot level that absorbs categories not seen during fit.
pub const UNKNOWN_LEVEL: &str = "__unknown__";

/// Scaling statistics of one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    pub column: String,
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl NumericStats {
    /// Fit over a non-empty column. Values are summed in sorted order so the
    /// result does not depend on row order.
    pub(crate) fn fit(column: &str, values: &mut [f64]) -> Self {
        values.sort_by(f64::total_cmp);
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let mut sq: Vec<f64> = values.iter().map(|v| (v - mean).powi(2)).collect();
        sq.sort_by(f64::total_cmp);
        let std = (sq.iter().sum::<f64>() / n).sqrt();
        Self {
            column: column.to_string(),
            mean,
            std,
            min: values.first().copied().unwrap_or_default(),
            max: values.last().copied().unwrap_or_default(),
        }
    }

    /// Clamp to the fit-time range. The flag reports whether clamping happened.
    pub fn clip(&self, value: f64) -> (f64, bool) {
        let clipped = value.clamp(self.min, self.max);
        (clipped, clipped != value)
    }

    /// Clip, then scale. A column with no spread scales to 0.
    pub fn scale(&self, value: f64, method: ScalingMethod) -> f64 {
        let (v, _) = self.clip(value);
        match method {
            ScalingMethod::ZScore if self.std > 0.0 => (v - self.mean) / self.std,
            ScalingMethod::MinMax if self.max > self.min => (v - self.min) / (self.max - self.min),
            _ => 0.0,
        }
    }
}

/// Encoding map of one categorical column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEncoding {
    pub column: String,
    pub method: EncodingMethod,
    /// Sorted, distinct categories seen during fit. A category's position is
    /// its ordinal code.
    pub categories: Vec<String>,
}

impl CategoryEncoding {
    pub(crate) fn fit<'a>(
        column: &str,
        method: EncodingMethod,
        values: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let mut categories: Vec<String> = values.into_iter().map(str::to_string).collect();
        categories.sort();
        categories.dedup();
        Self {
            column: column.to_string(),
            method,
            categories,
        }
    }

    pub fn code(&self, value: &str) -> Option<usize> {
        self.categories
            .binary_search_by(|c| c.as_str().cmp(value))
            .ok()
    }

    /// Number of output columns this encoding occupies.
    pub fn width(&self) -> usize {
        match self.method {
            EncodingMethod::Ordinal => 1,
            EncodingMethod::OneHot => self.categories.len() + 1,
        }
    }

    pub fn output_columns(&self) -> Vec<String> {
        match self.method {
            EncodingMethod::Ordinal => vec![format!("{}_encoded", self.column)],
            EncodingMethod::OneHot => self
                .categories
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(UNKNOWN_LEVEL))
                .map(|c| format!("{}={c}", self.column))
                .collect(),
        }
    }

    /// Append the encoding of `value`. Returns `false` when the value was not
    /// seen during fit and went to the unknown bucket.
    pub fn encode_into(&self, value: &str, out: &mut Vec<f64>) -> bool {
        let code = self.code(value);
        match self.method {
            EncodingMethod::Ordinal => out.push(code.map_or(UNKNOWN_CODE, |c| c as f64)),
            EncodingMethod::OneHot => {
                let hot = code.unwrap_or(self.categories.len());
                out.extend((0..self.width()).map(|i| if i == hot { 1.0 } else { 0.0 }));
            }
        }
        code.is_some()
    }
}

/// Parameters learned by fitting, sufficient to replay the transformation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedTransformerState {
    /// Year that ages are measured from.
    pub reference_year: i32,
    pub scaling: ScalingMethod,
    /// Raw columns transform mode reads, with their types.
    pub input_schema: SchemaDefinition,
    /// One entry per derived numeric column, in derivation order.
    pub numeric: Vec<NumericStats>,
    /// One entry per derived categorical column, in derivation order.
    pub categorical: Vec<CategoryEncoding>,
    /// Exact output column order.
    pub output_columns: Vec<String>,
    pub fitted_rows: usize,
}

impl FittedTransformerState {
    /// Output columns implied by the stored encodings, in layout order.
    pub fn layout_columns(&self) -> Vec<String> {
        let mut columns = Vec::new();
        for slot in LAYOUT {
            match slot {
                Slot::Numeric(i) => {
                    if let Some(stats) = self.numeric.get(i) {
                        columns.push(stats.column.clone());
                    }
                }
                Slot::Categorical(i) => {
                    if let Some(enc) = self.categorical.get(i) {
                        columns.extend(enc.output_columns());
                    }
                }
            }
        }
        columns
    }

    /// Check that the state describes what the current derivation produces.
    /// Returns a description of the first inconsistency.
    pub fn check_consistency(&self) -> Result<(), String> {
        let numeric: Vec<&str> = self.numeric.iter().map(|s| s.column.as_str()).collect();
        if numeric != NUMERIC_FEATURES {
            return Err(format!(
                "numeric columns {numeric:?} do not match {:?}",
                NUMERIC_FEATURES
            ));
        }
        let categorical: Vec<&str> = self.categorical.iter().map(|e| e.column.as_str()).collect();
        if categorical != CATEGORICAL_FEATURES {
            return Err(format!(
                "categorical columns {categorical:?} do not match {:?}",
                CATEGORICAL_FEATURES
            ));
        }
        for stats in &self.numeric {
            let finite = [stats.mean, stats.std, stats.min, stats.max]
                .iter()
                .all(|v| v.is_finite());
            if !finite || stats.min > stats.max || stats.std < 0.0 {
                return Err(format!("invalid statistics for '{}'", stats.column));
            }
        }
        for enc in &self.categorical {
            if enc.categories.windows(2).any(|w| w[0] >= w[1]) {
                return Err(format!("categories of '{}' are not sorted", enc.column));
            }
        }
        if self.output_columns != self.layout_columns() {
            return Err("output column order does not match the encodings".to_string());
        }
        Ok(())
    }
}
