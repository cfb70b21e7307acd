//! # homeval-core
//!
//! Shared foundation for the homeval house-price pipeline: layered configuration
//! (`figment`) and crash-safe file persistence. The ML stages in `homeval-ml`
//! and the `homeval` binary both build on these.

pub mod config;
pub mod error;
pub mod persistence;

pub use config::{
    ArtifactConfig, DataConfig, EncodingMethod, FeatureConfig, ModelConfig, PipelineConfig,
    ScalingMethod, ServerConfig, load_config,
};
pub use error::ConfigError;
