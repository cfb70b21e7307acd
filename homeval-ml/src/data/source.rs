//! Delimited-text dataset I/O.
//!
//! Raw, cleaned and featured datasets are exchanged as delimited text files with
//! a header row. In memory a file is a [`DataBatch`] of string-or-null cells;
//! typing happens later in the schema validator.

use crate::error::MlError;
use homeval_core::persistence::atomic_write;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

/// A batch of data rows, one `serde_json::Value` per cell.
///
/// Cells read from disk are either `Value::String` (trimmed) or `Value::Null`
/// for empty fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataBatch {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl DataBatch {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Text of a cell, `None` for null or absent cells.
    pub fn text(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .and_then(|v| v.as_str())
    }

    /// Append a row of optional strings.
    pub fn push_row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        let row = cells
            .into_iter()
            .map(|c| match c {
                Some(s) => serde_json::Value::String(s.into()),
                None => serde_json::Value::Null,
            })
            .collect();
        self.rows.push(row);
    }
}

pub(crate) fn delimiter_byte(delimiter: char) -> Result<u8, MlError> {
    u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| MlError::invalid_input(format!("delimiter {delimiter:?} is not ASCII")))
}

/// Read a delimited file into a [`DataBatch`].
pub fn read_csv(path: &Path, delimiter: char) -> Result<DataBatch, MlError> {
    let file = std::fs::File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            MlError::not_found(format!("dataset {}", path.display()))
        } else {
            e.into()
        }
    })?;
    let batch = parse_csv(file, delimiter)?;
    tracing::info!(
        path = %path.display(),
        rows = batch.row_count(),
        columns = batch.column_count(),
        "Loaded dataset"
    );
    Ok(batch)
}

/// Parse delimited text from any reader.
pub fn parse_csv<R: Read>(reader: R, delimiter: char) -> Result<DataBatch, MlError> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter_byte(delimiter)?)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    if columns.iter().all(String::is_empty) {
        return Err(MlError::invalid_input("dataset has no header row"));
    }

    let mut batch = DataBatch::new(columns);
    for record in rdr.records() {
        let record = record?;
        batch.push_row(
            record
                .iter()
                .map(|cell| (!cell.is_empty()).then(|| cell.to_string())),
        );
    }
    Ok(batch)
}

/// Write a header and rows of pre-rendered cells, atomically.
pub fn write_csv<I>(path: &Path, delimiter: char, columns: &[String], rows: I) -> Result<(), MlError>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(delimiter_byte(delimiter)?)
        .from_writer(Vec::new());
    wtr.write_record(columns)?;
    let mut count = 0usize;
    for row in rows {
        wtr.write_record(&row)?;
        count += 1;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| MlError::Io(std::io::Error::other(e.to_string())))?;
    atomic_write(path, &bytes)?;
    tracing::info!(path = %path.display(), rows = count, "Wrote dataset");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    #[test]
    fn test_parse_csv_empty_cells_are_null() {
        let text = "sqft,location\n1500, Urban \n,Rural\n";
        let batch = parse_csv(text.as_bytes(), ',').unwrap();
        assert_eq!(batch.columns, vec!["sqft", "location"]);
        assert_eq!(batch.row_count(), 2);
        assert_eq!(batch.rows[0][1], Value::String("Urban".into()));
        assert_eq!(batch.rows[1][0], Value::Null);
        assert_eq!(batch.text(1, 1), Some("Rural"));
        assert_eq!(batch.text(1, 0), None);
    }

    #[test]
    fn test_parse_csv_custom_delimiter() {
        let batch = parse_csv("a;b\n1;2\n".as_bytes(), ';').unwrap();
        assert_eq!(batch.column_index("b"), Some(1));
        assert_eq!(batch.text(0, 1), Some("2"));
    }

    #[test]
    fn test_parse_csv_ragged_row_is_error() {
        let result = parse_csv("a,b\n1,2,3\n".as_bytes(), ',');
        assert!(matches!(result, Err(MlError::Csv(_))));
    }

    #[test]
    fn test_non_ascii_delimiter_rejected() {
        assert!(matches!(
            parse_csv("a\n".as_bytes(), '→'),
            Err(MlError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out").join("data.csv");
        let columns = vec!["x".to_string(), "label".to_string()];
        write_csv(
            &path,
            ',',
            &columns,
            vec![
                vec!["1.5".to_string(), "a,b".to_string()],
                vec!["2".to_string(), String::new()],
            ],
        )
        .unwrap();

        let batch = read_csv(&path, ',').unwrap();
        assert_eq!(batch.columns, columns);
        assert_eq!(batch.text(0, 1), Some("a,b"));
        assert_eq!(batch.rows[1][1], Value::Null);
    }

    #[test]
    fn test_read_missing_file_is_not_found() {
        let result = read_csv(Path::new("/definitely/not/here.csv"), ',');
        assert!(matches!(result, Err(MlError::NotFound(_))));
    }
}
