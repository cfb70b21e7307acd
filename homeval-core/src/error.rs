//! Error types for configuration loading and validation.

use std::path::PathBuf;

/// Errors raised while resolving or validating a [`PipelineConfig`](crate::PipelineConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("Unsupported config format for {} (expected .yaml, .yml, .toml or .json)", .path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("Invalid config value for '{field}': {reason}")]
    Invalid { field: String, reason: String },

    #[error("Failed to load configuration: {0}")]
    Figment(#[from] Box<figment::Error>),
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
