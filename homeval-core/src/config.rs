//! Configuration system for the homeval pipeline.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment.
//! The config file is the "model config" document of the pipeline: it declares
//! the target column, the numeric/categorical column roles, the closed category
//! domains and the model hyperparameters. It is read once at pipeline start and
//! passed by reference into every stage.

use crate::error::ConfigError;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Config file picked up when no explicit path is given.
pub const DEFAULT_CONFIG_PATH: &str = "configs/model_config.yaml";

/// Environment variable prefix (`HOMEVAL_MODEL__ALPHA=0.5` sets `model.alpha`).
pub const ENV_PREFIX: &str = "HOMEVAL_";

/// Raw-record fields the feature derivation reads, with their numeric kind.
const REQUIRED_NUMERIC: &[(&str, bool)] = &[
    ("sqft", false),
    ("bedrooms", true),
    ("bathrooms", false),
    ("year_built", true),
];
const REQUIRED_CATEGORICAL: &[&str] = &["location", "condition"];

/// Top-level configuration for a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub artifacts: ArtifactConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Dataset file locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_raw_path")]
    pub raw_path: PathBuf,
    #[serde(default = "default_cleaned_path")]
    pub cleaned_path: PathBuf,
    #[serde(default = "default_featured_path")]
    pub featured_path: PathBuf,
    /// Field delimiter for all dataset files.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            raw_path: default_raw_path(),
            cleaned_path: default_cleaned_path(),
            featured_path: default_featured_path(),
            delimiter: default_delimiter(),
        }
    }
}

fn default_raw_path() -> PathBuf {
    PathBuf::from("data/raw/house_data.csv")
}

fn default_cleaned_path() -> PathBuf {
    PathBuf::from("data/processed/cleaned_house_data.csv")
}

fn default_featured_path() -> PathBuf {
    PathBuf::from("data/processed/featured_house_data.csv")
}

fn default_delimiter() -> char {
    ','
}

/// Numeric scaling applied after clipping to the fit-time range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingMethod {
    /// `(x - mean) / std`
    #[default]
    ZScore,
    /// `(x - min) / (max - min)`
    MinMax,
}

/// Categorical encoding layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingMethod {
    /// One `<name>_encoded` column holding the category index.
    #[default]
    Ordinal,
    /// One `<name>=<category>` indicator column per category plus an unknown slot.
    OneHot,
}

/// Column roles and feature-engineering policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Regression target column.
    #[serde(default = "default_target")]
    pub target: String,
    #[serde(default = "default_numeric_columns")]
    pub numeric_columns: Vec<String>,
    /// Subset of `numeric_columns` that must hold whole numbers.
    #[serde(default = "default_integer_columns")]
    pub integer_columns: Vec<String>,
    #[serde(default = "default_categorical_columns")]
    pub categorical_columns: Vec<String>,
    /// Closed value sets for categorical columns. Columns without an entry
    /// accept any value.
    #[serde(default = "default_domains")]
    pub domains: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub scaling: ScalingMethod,
    #[serde(default)]
    pub encoding: EncodingMethod,
    /// Per-column encoding overrides, keyed by derived categorical column name.
    #[serde(default)]
    pub encoding_overrides: BTreeMap<String, EncodingMethod>,
    /// IQR multiplier for dropping target outliers during cleaning.
    /// `None` disables the filter.
    #[serde(default = "default_price_outlier_iqr")]
    pub price_outlier_iqr: Option<f64>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            target: default_target(),
            numeric_columns: default_numeric_columns(),
            integer_columns: default_integer_columns(),
            categorical_columns: default_categorical_columns(),
            domains: default_domains(),
            scaling: ScalingMethod::default(),
            encoding: EncodingMethod::default(),
            encoding_overrides: BTreeMap::new(),
            price_outlier_iqr: default_price_outlier_iqr(),
        }
    }
}

impl FeatureConfig {
    /// Encoding for a derived categorical column.
    pub fn encoding_for(&self, column: &str) -> EncodingMethod {
        self.encoding_overrides
            .get(column)
            .copied()
            .unwrap_or(self.encoding)
    }

    /// All feature columns (numeric then categorical), excluding the target.
    pub fn feature_columns(&self) -> impl Iterator<Item = &str> {
        self.numeric_columns
            .iter()
            .chain(self.categorical_columns.iter())
            .map(String::as_str)
    }

    pub fn is_integer(&self, column: &str) -> bool {
        self.integer_columns.iter().any(|c| c == column)
    }
}

fn default_target() -> String {
    "price".to_string()
}

fn default_numeric_columns() -> Vec<String> {
    REQUIRED_NUMERIC.iter().map(|(c, _)| c.to_string()).collect()
}

fn default_integer_columns() -> Vec<String> {
    REQUIRED_NUMERIC
        .iter()
        .filter(|(_, int)| *int)
        .map(|(c, _)| c.to_string())
        .collect()
}

fn default_categorical_columns() -> Vec<String> {
    REQUIRED_CATEGORICAL.iter().map(|c| c.to_string()).collect()
}

fn default_domains() -> BTreeMap<String, Vec<String>> {
    let to_vec = |vals: &[&str]| vals.iter().map(|v| v.to_string()).collect::<Vec<_>>();
    BTreeMap::from([
        (
            "location".to_string(),
            to_vec(&["Urban", "Suburban", "Rural", "Waterfront", "Mountain"]),
        ),
        (
            "condition".to_string(),
            to_vec(&["Poor", "Fair", "Good", "Excellent"]),
        ),
    ])
}

fn default_price_outlier_iqr() -> Option<f64> {
    Some(1.5)
}

/// Training driver hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_name")]
    pub name: String,
    /// L2 penalty of the ridge regression (0 = ordinary least squares).
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    /// Fraction of rows held out for evaluation.
    #[serde(default = "default_test_size")]
    pub test_size: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            alpha: default_alpha(),
            test_size: default_test_size(),
            seed: default_seed(),
        }
    }
}

fn default_model_name() -> String {
    "house_price_model".to_string()
}

fn default_alpha() -> f64 {
    1.0
}

fn default_test_size() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

/// Artifact locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactConfig {
    #[serde(default = "default_preprocessor_path")]
    pub preprocessor_path: PathBuf,
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
    /// Directory holding the local experiment log.
    #[serde(default = "default_tracking_dir")]
    pub tracking_dir: PathBuf,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            preprocessor_path: default_preprocessor_path(),
            model_path: default_model_path(),
            tracking_dir: default_tracking_dir(),
        }
    }
}

fn default_preprocessor_path() -> PathBuf {
    PathBuf::from("models/trained/preprocessor.json")
}

fn default_model_path() -> PathBuf {
    PathBuf::from("models/trained/house_price_model.json")
}

fn default_tracking_dir() -> PathBuf {
    PathBuf::from("mlruns")
}

/// Prediction API bind address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl PipelineConfig {
    /// Check cross-field consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let f = &self.features;

        if f.target.trim().is_empty() {
            return Err(ConfigError::invalid("features.target", "must not be empty"));
        }
        if f.feature_columns().any(|c| c == f.target) {
            return Err(ConfigError::invalid(
                "features.target",
                format!("'{}' is also declared as a feature column", f.target),
            ));
        }
        for (column, integer) in REQUIRED_NUMERIC {
            if !f.numeric_columns.iter().any(|c| c == *column) {
                return Err(ConfigError::invalid(
                    "features.numeric_columns",
                    format!("missing required column '{column}'"),
                ));
            }
            if *integer && !f.is_integer(column) {
                return Err(ConfigError::invalid(
                    "features.integer_columns",
                    format!("'{column}' must be declared as an integer column"),
                ));
            }
        }
        for column in REQUIRED_CATEGORICAL {
            if !f.categorical_columns.iter().any(|c| c == *column) {
                return Err(ConfigError::invalid(
                    "features.categorical_columns",
                    format!("missing required column '{column}'"),
                ));
            }
        }
        if let Some(c) = f
            .integer_columns
            .iter()
            .find(|c| !f.numeric_columns.contains(*c))
        {
            return Err(ConfigError::invalid(
                "features.integer_columns",
                format!("'{c}' is not a numeric column"),
            ));
        }
        if let Some(c) = f
            .numeric_columns
            .iter()
            .find(|c| f.categorical_columns.contains(*c))
        {
            return Err(ConfigError::invalid(
                "features.categorical_columns",
                format!("'{c}' is declared both numeric and categorical"),
            ));
        }
        for (column, values) in &f.domains {
            if !f.categorical_columns.contains(column) {
                return Err(ConfigError::invalid(
                    "features.domains",
                    format!("'{column}' is not a categorical column"),
                ));
            }
            if values.is_empty() {
                return Err(ConfigError::invalid(
                    "features.domains",
                    format!("domain for '{column}' is empty"),
                ));
            }
        }
        if let Some(k) = f.price_outlier_iqr {
            if !k.is_finite() || k <= 0.0 {
                return Err(ConfigError::invalid(
                    "features.price_outlier_iqr",
                    "must be a positive number",
                ));
            }
        }

        let m = &self.model;
        if !m.alpha.is_finite() || m.alpha < 0.0 {
            return Err(ConfigError::invalid("model.alpha", "must be >= 0"));
        }
        if !(m.test_size > 0.0 && m.test_size < 1.0) {
            return Err(ConfigError::invalid(
                "model.test_size",
                "must be strictly between 0 and 1",
            ));
        }
        Ok(())
    }
}

/// Load configuration from layered sources and validate it.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `HOMEVAL_`, `__` separates sections)
/// 2. Config file (`path`, or `configs/model_config.yaml` if it exists)
/// 3. Built-in defaults
///
/// An explicit `path` that does not exist is an error; the default path is optional.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(PipelineConfig::default()));

    match path {
        Some(p) if !p.exists() => {
            return Err(ConfigError::NotFound {
                path: p.to_path_buf(),
            });
        }
        Some(p) => figment = merge_file(figment, p)?,
        None => {
            let default = Path::new(DEFAULT_CONFIG_PATH);
            if default.exists() {
                figment = merge_file(figment, default)?;
            }
        }
    }

    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: PipelineConfig = figment.extract().map_err(Box::new)?;
    config.validate()?;
    tracing::debug!(?config, "Resolved pipeline configuration");
    Ok(config)
}

fn merge_file(figment: Figment, path: &Path) -> Result<Figment, ConfigError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let figment = match ext.as_deref() {
        Some("yaml") | Some("yml") => figment.merge(Yaml::file(path)),
        Some("toml") => figment.merge(Toml::file(path)),
        Some("json") => figment.merge(Json::file(path)),
        _ => {
            return Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
            });
        }
    };
    Ok(figment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_are_valid() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        Jail::expect_with(|_jail| {
            let config = load_config(None).map_err(|e| e.to_string())?;
            assert_eq!(config, PipelineConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_load_yaml_file_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "model_config.yaml",
                r#"
features:
  scaling: min_max
  encoding: one_hot
  price_outlier_iqr: 3.0
model:
  alpha: 0.5
  seed: 7
"#,
            )?;
            let config =
                load_config(Some(Path::new("model_config.yaml"))).map_err(|e| e.to_string())?;
            assert_eq!(config.features.scaling, ScalingMethod::MinMax);
            assert_eq!(config.features.encoding, EncodingMethod::OneHot);
            assert_eq!(config.features.price_outlier_iqr, Some(3.0));
            assert_eq!(config.model.alpha, 0.5);
            assert_eq!(config.model.seed, 7);
            // untouched sections keep their defaults
            assert_eq!(config.features.target, "price");
            assert_eq!(config.server, ServerConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_default_path_is_picked_up() {
        Jail::expect_with(|jail| {
            jail.create_dir("configs")?;
            jail.create_file("configs/model_config.yaml", "model:\n  name: from_default\n")?;
            let config = load_config(None).map_err(|e| e.to_string())?;
            assert_eq!(config.model.name, "from_default");
            Ok(())
        });
    }

    #[test]
    fn test_toml_file_and_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file("pipeline.toml", "[server]\nport = 9000\n")?;
            jail.set_env("HOMEVAL_MODEL__ALPHA", "0.25");
            jail.set_env("HOMEVAL_SERVER__HOST", "127.0.0.1");
            let config =
                load_config(Some(Path::new("pipeline.toml"))).map_err(|e| e.to_string())?;
            assert_eq!(config.server.port, 9000);
            assert_eq!(config.server.host, "127.0.0.1");
            assert_eq!(config.model.alpha, 0.25);
            Ok(())
        });
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        Jail::expect_with(|_jail| {
            let err = load_config(Some(Path::new("nope.yaml"))).unwrap_err();
            assert!(matches!(err, ConfigError::NotFound { .. }));
            Ok(())
        });
    }

    #[test]
    fn test_unsupported_extension() {
        Jail::expect_with(|jail| {
            jail.create_file("config.ini", "alpha=1")?;
            let err = load_config(Some(Path::new("config.ini"))).unwrap_err();
            assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));
            Ok(())
        });
    }

    #[test]
    fn test_invalid_values_rejected_on_load() {
        Jail::expect_with(|jail| {
            jail.create_file("bad.yaml", "model:\n  test_size: 1.5\n")?;
            let err = load_config(Some(Path::new("bad.yaml"))).unwrap_err();
            assert!(err.to_string().contains("model.test_size"));
            Ok(())
        });
    }

    #[test]
    fn test_validate_target_cannot_be_feature() {
        let mut config = PipelineConfig::default();
        config.features.target = "sqft".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("features.target"));
    }

    #[test]
    fn test_validate_requires_derivation_columns() {
        let mut config = PipelineConfig::default();
        config.features.numeric_columns.retain(|c| c != "bathrooms");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("bathrooms"));
    }

    #[test]
    fn test_validate_domain_must_be_categorical() {
        let mut config = PipelineConfig::default();
        config
            .features
            .domains
            .insert("sqft".into(), vec!["big".into()]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_negative_alpha() {
        let mut config = PipelineConfig::default();
        config.model.alpha = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_encoding_override() {
        let mut features = FeatureConfig::default();
        features
            .encoding_overrides
            .insert("location".into(), EncodingMethod::OneHot);
        assert_eq!(features.encoding_for("location"), EncodingMethod::OneHot);
        assert_eq!(features.encoding_for("condition"), EncodingMethod::Ordinal);
    }
}
