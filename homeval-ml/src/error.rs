//! Error types for the homeval-ml crate.

use crate::data::schema::SchemaError;
use homeval_core::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for pipeline operations.
///
/// Stage-level failures (`Schema`, `EmptyDataset`, `Artifact*`) are fatal to the
/// stage that raised them and carry enough context to diagnose without a rerun.
#[derive(Debug, Error)]
pub enum MlError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Empty dataset after {stage}: none of {input_rows} input rows survived")]
    EmptyDataset { stage: String, input_rows: usize },

    #[error(
        "Artifact version mismatch at {}: found {}, expected {expected}",
        .path.display(),
        version_label(.found)
    )]
    ArtifactVersion {
        path: PathBuf,
        found: Option<u64>,
        expected: u32,
    },

    #[error("Artifact corrupt at {}: {reason}", .path.display())]
    ArtifactCorrupt { path: PathBuf, reason: String },

    #[error("Training error: {0}")]
    Training(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

fn version_label(found: &Option<u64>) -> String {
    match found {
        Some(v) => v.to_string(),
        None => "no version marker".to_string(),
    }
}

impl MlError {
    pub fn training(msg: impl Into<String>) -> Self {
        Self::Training(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ArtifactCorrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error was caused by the caller's input rather than by the
    /// pipeline or its artifacts.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::Schema(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::schema::SchemaIssue;

    #[test]
    fn test_empty_dataset_message() {
        let err = MlError::EmptyDataset {
            stage: "cleaning".into(),
            input_rows: 7,
        };
        let msg = err.to_string();
        assert!(msg.contains("cleaning"));
        assert!(msg.contains('7'));
    }

    #[test]
    fn test_version_message_without_marker() {
        let err = MlError::ArtifactVersion {
            path: PathBuf::from("models/preprocessor.json"),
            found: None,
            expected: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("no version marker"));
        assert!(msg.contains("models/preprocessor.json"));
    }

    #[test]
    fn test_schema_error_is_transparent() {
        let err: MlError = SchemaError::from(vec![SchemaIssue::MissingColumn {
            column: "sqft".into(),
        }])
        .into();
        assert!(err.to_string().contains("sqft"));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_io_is_not_client_error() {
        let err: MlError = std::io::Error::other("disk").into();
        assert!(!err.is_client_error());
    }
}
