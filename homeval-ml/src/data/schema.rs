//! Schema definition and validation for tabular datasets.
//!
//! The validator runs before any transformation: it checks that every expected
//! column is present and that every non-empty cell parses as the column's
//! primitive type. Text in a numeric column is reported, never coerced.

use crate::data::source::DataBatch;
use homeval_core::FeatureConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of issues spelled out in a [`SchemaError`] message.
const MAX_REPORTED_ISSUES: usize = 10;

/// Primitive column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Float,
    String,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::String => "string",
        };
        f.write_str(name)
    }
}

/// Schema for a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub dtype: ColumnType,
}

/// Expected columns of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub columns: Vec<ColumnSchema>,
}

impl SchemaDefinition {
    /// Feature columns declared in the config, typed by role.
    pub fn for_features(features: &FeatureConfig) -> Self {
        let mut columns: Vec<ColumnSchema> = features
            .numeric_columns
            .iter()
            .map(|name| ColumnSchema {
                name: name.clone(),
                dtype: if features.is_integer(name) {
                    ColumnType::Integer
                } else {
                    ColumnType::Float
                },
            })
            .collect();
        columns.extend(features.categorical_columns.iter().map(|name| ColumnSchema {
            name: name.clone(),
            dtype: ColumnType::String,
        }));
        Self { columns }
    }

    /// Feature columns plus the float target column.
    pub fn for_training(features: &FeatureConfig) -> Self {
        let mut schema = Self::for_features(features);
        schema.columns.push(ColumnSchema {
            name: features.target.clone(),
            dtype: ColumnType::Float,
        });
        schema
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// One problem found by the validator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaIssue {
    MissingColumn {
        column: String,
    },
    TypeMismatch {
        column: String,
        /// Zero-based data row (header excluded).
        row: usize,
        expected: ColumnType,
        found: String,
    },
    ColumnOrder {
        expected: Vec<String>,
        found: Vec<String>,
    },
}

impl SchemaIssue {
    pub fn column(&self) -> Option<&str> {
        match self {
            SchemaIssue::MissingColumn { column } | SchemaIssue::TypeMismatch { column, .. } => {
                Some(column.as_str())
            }
            SchemaIssue::ColumnOrder { .. } => None,
        }
    }
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaIssue::MissingColumn { column } => write!(f, "missing column '{column}'"),
            SchemaIssue::TypeMismatch {
                column,
                row,
                expected,
                found,
            } => write!(
                f,
                "column '{column}' row {row}: expected {expected}, found {found:?}"
            ),
            SchemaIssue::ColumnOrder { expected, found } => write!(
                f,
                "column layout mismatch: expected [{}], found [{}]",
                expected.join(", "),
                found.join(", ")
            ),
        }
    }
}

/// A dataset did not match its expected schema.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Schema error: {}", render_issues(.issues))]
pub struct SchemaError {
    pub issues: Vec<SchemaIssue>,
}

fn render_issues(issues: &[SchemaIssue]) -> String {
    let mut parts: Vec<String> = issues
        .iter()
        .take(MAX_REPORTED_ISSUES)
        .map(ToString::to_string)
        .collect();
    if issues.len() > MAX_REPORTED_ISSUES {
        parts.push(format!("... and {} more", issues.len() - MAX_REPORTED_ISSUES));
    }
    parts.join("; ")
}

impl From<Vec<SchemaIssue>> for SchemaError {
    fn from(issues: Vec<SchemaIssue>) -> Self {
        Self { issues }
    }
}

impl SchemaError {
    /// Distinct offending column names, in first-seen order.
    pub fn columns(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for column in self.issues.iter().filter_map(SchemaIssue::column) {
            if !seen.contains(&column) {
                seen.push(column);
            }
        }
        seen
    }
}

/// Parse a finite float.
pub fn parse_float(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a whole number; integral floats such as `1995.0` are accepted.
pub fn parse_integer(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(v) = text.parse::<i64>() {
        return Some(v);
    }
    parse_float(text)
        .filter(|v| v.fract() == 0.0 && v.abs() < i64::MAX as f64)
        .map(|v| v as i64)
}

fn conforms(dtype: ColumnType, text: &str) -> bool {
    match dtype {
        ColumnType::Integer => parse_integer(text).is_some(),
        ColumnType::Float => parse_float(text).is_some(),
        ColumnType::String => true,
    }
}

/// Validate a batch against a schema.
///
/// Columns not named by the schema are ignored. Null cells are accepted here;
/// the cleaning stage decides what to do with them. Every issue is collected
/// before failing.
pub fn validate_batch(batch: &DataBatch, schema: &SchemaDefinition) -> Result<(), SchemaError> {
    let mut issues = Vec::new();
    let mut typed: Vec<(usize, &ColumnSchema)> = Vec::new();

    for col in &schema.columns {
        match batch.column_index(&col.name) {
            Some(idx) => typed.push((idx, col)),
            None => issues.push(SchemaIssue::MissingColumn {
                column: col.name.clone(),
            }),
        }
    }

    for (row_idx, row) in batch.rows.iter().enumerate() {
        for (idx, col) in &typed {
            let Some(serde_json::Value::String(text)) = row.get(*idx) else {
                continue;
            };
            if !conforms(col.dtype, text) {
                issues.push(SchemaIssue::TypeMismatch {
                    column: col.name.clone(),
                    row: row_idx,
                    expected: col.dtype,
                    found: text.clone(),
                });
            }
        }
    }

    if issues.is_empty() {
        tracing::debug!(
            columns = schema.columns.len(),
            rows = batch.row_count(),
            "Schema validation passed"
        );
        Ok(())
    } else {
        tracing::warn!(issues = issues.len(), "Schema validation failed");
        Err(SchemaError { issues })
    }
}

/// Validate one JSON object (an inference record) against a schema.
///
/// Integer columns take whole JSON numbers, float columns take finite numbers,
/// string columns take strings. `null` counts as missing.
pub fn validate_record(
    record: &serde_json::Map<String, serde_json::Value>,
    schema: &SchemaDefinition,
) -> Result<(), SchemaError> {
    use serde_json::Value;

    let mut issues = Vec::new();
    for col in &schema.columns {
        let ok = match (record.get(&col.name), col.dtype) {
            (None | Some(Value::Null), _) => {
                issues.push(SchemaIssue::MissingColumn {
                    column: col.name.clone(),
                });
                continue;
            }
            (Some(Value::Number(n)), ColumnType::Integer) => {
                n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|v| v.fract() == 0.0)
            }
            (Some(Value::Number(n)), ColumnType::Float) => {
                n.as_f64().is_some_and(f64::is_finite)
            }
            (Some(Value::String(_)), ColumnType::String) => true,
            _ => false,
        };
        if !ok {
            issues.push(SchemaIssue::TypeMismatch {
                column: col.name.clone(),
                row: 0,
                expected: col.dtype,
                found: record.get(&col.name).map(ToString::to_string).unwrap_or_default(),
            });
        }
    }
    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues.into())
    }
}
