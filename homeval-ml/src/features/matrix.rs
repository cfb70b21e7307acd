//! Featured dataset: feature vectors plus an optional target column.

use crate::data::schema::{SchemaIssue, parse_float};
use crate::data::{DataBatch, SchemaError, write_csv};
use crate::error::MlError;
use std::path::Path;

/// Named target values aligned with the matrix rows.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetColumn {
    pub name: String,
    pub values: Vec<f64>,
}

/// Feature vectors in a fixed column order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub target: Option<TargetColumn>,
}

impl FeatureMatrix {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write features then the target (if any) as a delimited file.
    pub fn write_csv(&self, path: &Path, delimiter: char) -> Result<(), MlError> {
        let mut header = self.columns.clone();
        if let Some(target) = &self.target {
            header.push(target.name.clone());
        }
        let rows = self.rows.iter().enumerate().map(|(i, row)| {
            let mut cells: Vec<String> = row.iter().map(f64::to_string).collect();
            if let Some(target) = &self.target {
                cells.push(target.values[i].to_string());
            }
            cells
        });
        write_csv(path, delimiter, &header, rows)
    }

    /// Parse a featured batch. Every column except `target` is a feature and
    /// every cell must be a finite number. A missing target column is an error
    /// only when `require_target` is set.
    pub fn from_batch(
        batch: &DataBatch,
        target: &str,
        require_target: bool,
    ) -> Result<Self, MlError> {
        let target_idx = batch.column_index(target);
        if require_target && target_idx.is_none() {
            return Err(SchemaError::from(vec![SchemaIssue::MissingColumn {
                column: target.to_string(),
            }])
            .into());
        }

        let feature_idx: Vec<usize> = (0..batch.column_count())
            .filter(|i| Some(*i) != target_idx)
            .collect();
        let columns = feature_idx
            .iter()
            .map(|&i| batch.columns[i].clone())
            .collect();

        let mut issues = Vec::new();
        let mut cell = |row: usize, col: usize| -> f64 {
            let text = batch.text(row, col);
            match text.and_then(parse_float) {
                Some(v) => v,
                None => {
                    issues.push(SchemaIssue::TypeMismatch {
                        column: batch.columns[col].clone(),
                        row,
                        expected: crate::data::ColumnType::Float,
                        found: text.unwrap_or_default().to_string(),
                    });
                    f64::NAN
                }
            }
        };

        let mut rows = Vec::with_capacity(batch.row_count());
        let mut values = Vec::with_capacity(batch.row_count());
        for row in 0..batch.row_count() {
            rows.push(feature_idx.iter().map(|&col| cell(row, col)).collect());
            if let Some(col) = target_idx {
                values.push(cell(row, col));
            }
        }
        if !issues.is_empty() {
            return Err(SchemaError::from(issues).into());
        }

        Ok(Self {
            columns,
            rows,
            target: target_idx.map(|_| TargetColumn {
                name: target.to_string(),
                values,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{parse_csv, read_csv};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("featured.csv");
        let matrix = FeatureMatrix {
            columns: vec!["a".into(), "b".into()],
            rows: vec![vec![0.1, -1.0], vec![1.0 / 3.0, 2.5e-7]],
            target: Some(TargetColumn {
                name: "price".into(),
                values: vec![100.0, 200.5],
            }),
        };
        matrix.write_csv(&path, ',').unwrap();

        let batch = read_csv(&path, ',').unwrap();
        let reread = FeatureMatrix::from_batch(&batch, "price", true).unwrap();
        assert_eq!(reread, matrix);
    }

    #[test]
    fn test_missing_target_when_required() {
        let batch = parse_csv("a,b\n1,2\n".as_bytes(), ',').unwrap();
        let err = FeatureMatrix::from_batch(&batch, "price", true).unwrap_err();
        assert!(err.to_string().contains("price"));

        let matrix = FeatureMatrix::from_batch(&batch, "price", false).unwrap();
        assert!(matrix.target.is_none());
        assert_eq!(matrix.len(), 1);
    }

    #[test]
    fn test_non_numeric_cells_reported() {
        let batch = parse_csv("a,price\nx,1\n2,\n".as_bytes(), ',').unwrap();
        let err = FeatureMatrix::from_batch(&batch, "price", true).unwrap_err();
        let MlError::Schema(schema) = err else {
            panic!("expected schema error");
        };
        assert_eq!(schema.issues.len(), 2);
        assert_eq!(schema.columns(), vec!["a", "price"]);
    }
}
