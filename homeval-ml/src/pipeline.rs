//! Pipeline stages wired to files.
//!
//! Each stage reads its input from disk, writes its output atomically and
//! returns a summary. The configuration is passed in by reference and never
//! modified.

use crate::data::{CleanedDataset, CleaningReport, clean, read_csv, write_csv};
use crate::error::MlError;
use crate::features::{FeatureMatrix, FeatureTransformer, FittedTransformerState, store};
use crate::training::{ExperimentTracker, TrainedModel, save_model, train_model};
use homeval_core::PipelineConfig;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Load a raw dataset, validate and clean it, write the cleaned dataset.
pub fn process_data(
    input: &Path,
    output: &Path,
    config: &PipelineConfig,
) -> Result<CleaningReport, MlError> {
    let features = &config.features;
    let delimiter = config.data.delimiter;
    let batch = read_csv(input, delimiter)?;
    let cleaned = clean(&batch, features)?;
    write_csv(
        output,
        delimiter,
        &cleaned.columns(&features.target),
        cleaned.rows(),
    )?;
    Ok(cleaned.report)
}

/// Fit the feature transformer on a cleaned dataset, write the featured
/// dataset and save the fitted state.
pub fn engineer_features(
    input: &Path,
    output: &Path,
    preprocessor: &Path,
    config: &PipelineConfig,
) -> Result<FittedTransformerState, MlError> {
    let batch = read_csv(input, config.data.delimiter)?;
    let cleaned = CleanedDataset::from_batch(&batch, &config.features)?;
    let (matrix, state) = FeatureTransformer::new(&config.features).fit(&cleaned)?;
    matrix.write_csv(output, config.data.delimiter)?;
    store::save(&state, preprocessor)?;
    Ok(state)
}

/// Outcome of a tracked training run.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingSummary {
    pub run_id: String,
    pub model_path: PathBuf,
    pub model: TrainedModel,
}

fn run_params(config: &PipelineConfig, data: &Path) -> BTreeMap<String, serde_json::Value> {
    let m = &config.model;
    BTreeMap::from([
        ("alpha".to_string(), serde_json::json!(m.alpha)),
        ("test_size".to_string(), serde_json::json!(m.test_size)),
        ("seed".to_string(), serde_json::json!(m.seed)),
        ("scaling".to_string(), serde_json::json!(config.features.scaling)),
        ("encoding".to_string(), serde_json::json!(config.features.encoding)),
        ("data".to_string(), serde_json::json!(data.display().to_string())),
    ])
}

fn fit_and_save(
    data: &Path,
    preprocessor: &Path,
    model_path: &Path,
    config: &PipelineConfig,
) -> Result<TrainedModel, MlError> {
    let state = store::load(preprocessor)?;
    let batch = read_csv(data, config.data.delimiter)?;
    let matrix = FeatureMatrix::from_batch(&batch, &config.features.target, true)?;
    let trained = train_model(&matrix, &state, config)?;
    save_model(&trained, model_path)?;
    Ok(trained)
}

/// Train on a featured dataset and save the model, tracking the run.
pub fn train(
    data: &Path,
    preprocessor: &Path,
    model_path: &Path,
    config: &PipelineConfig,
) -> Result<TrainingSummary, MlError> {
    let tracker = ExperimentTracker::new(&config.artifacts.tracking_dir);
    let mut run = tracker.start_run(&config.model.name, run_params(config, data))?;

    match fit_and_save(data, preprocessor, model_path, config) {
        Ok(model) => {
            let artifacts = BTreeMap::from([
                ("model".to_string(), model_path.to_path_buf()),
                ("preprocessor".to_string(), preprocessor.to_path_buf()),
            ]);
            tracker.complete(&mut run, model.metrics.clone(), artifacts)?;
            Ok(TrainingSummary {
                run_id: run.id,
                model_path: model_path.to_path_buf(),
                model,
            })
        }
        Err(e) => {
            if let Err(track_err) = tracker.fail(&mut run, &e.to_string()) {
                tracing::warn!(error = %track_err, "Could not record failed run");
            }
            Err(e)
        }
    }
}

/// Result of running every stage.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub cleaning: CleaningReport,
    pub feature_columns: Vec<String>,
    pub training: TrainingSummary,
}

/// Process, engineer and train using the paths in `config`.
pub fn run_all(config: &PipelineConfig) -> Result<RunSummary, MlError> {
    let data = &config.data;
    let artifacts = &config.artifacts;
    tracing::info!(raw = %data.raw_path.display(), "Running full pipeline");

    let cleaning = process_data(&data.raw_path, &data.cleaned_path, config)?;
    let state = engineer_features(
        &data.cleaned_path,
        &data.featured_path,
        &artifacts.preprocessor_path,
        config,
    )?;
    let training = train(
        &data.featured_path,
        &artifacts.preprocessor_path,
        &artifacts.model_path,
        config,
    )?;

    Ok(RunSummary {
        cleaning,
        feature_columns: state.output_columns,
        training,
    })
}
