//! Subcommand handlers.

use crate::{Commands, ConfigAction};
use anyhow::Context;
use homeval_core::config::DEFAULT_CONFIG_PATH;
use homeval_core::{PipelineConfig, load_config};
use homeval_ml::inference::{self, HousePredictionRequest, Predictor};
use homeval_ml::training::ExperimentTracker;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, config_path: Option<&Path>) -> anyhow::Result<()> {
    if let Commands::Config {
        action: ConfigAction::Init { path },
    } = &command
    {
        return init_config(path.as_deref());
    }

    let config = load_config(config_path).context("Failed to load configuration")?;

    match command {
        Commands::Process { input, output } => {
            let input = input.unwrap_or_else(|| config.data.raw_path.clone());
            let output = output.unwrap_or_else(|| config.data.cleaned_path.clone());
            let report = homeval_ml::process_data(&input, &output, &config)
                .with_context(|| format!("Processing {} failed", input.display()))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Commands::Engineer {
            input,
            output,
            preprocessor,
        } => {
            let input = input.unwrap_or_else(|| config.data.cleaned_path.clone());
            let output = output.unwrap_or_else(|| config.data.featured_path.clone());
            let preprocessor =
                preprocessor.unwrap_or_else(|| config.artifacts.preprocessor_path.clone());
            let state = homeval_ml::engineer_features(&input, &output, &preprocessor, &config)
                .with_context(|| format!("Feature engineering on {} failed", input.display()))?;
            println!(
                "Fitted on {} rows, {} feature columns",
                state.fitted_rows,
                state.output_columns.len()
            );
            println!("  Featured data: {}", output.display());
            println!("  Preprocessor:  {}", preprocessor.display());
            Ok(())
        }
        Commands::Train {
            data,
            preprocessor,
            output_model_path,
        } => {
            let data = data.unwrap_or_else(|| config.data.featured_path.clone());
            let preprocessor =
                preprocessor.unwrap_or_else(|| config.artifacts.preprocessor_path.clone());
            let model_path =
                output_model_path.unwrap_or_else(|| config.artifacts.model_path.clone());
            let summary = homeval_ml::train(&data, &preprocessor, &model_path, &config)
                .with_context(|| format!("Training on {} failed", data.display()))?;
            println!("Run {} completed", summary.run_id);
            for (name, value) in summary.model.metrics.as_pairs() {
                println!("  {name:<10} {value:.4}");
            }
            println!("  Model: {}", summary.model_path.display());
            Ok(())
        }
        Commands::Predict {
            input,
            preprocessor,
            model,
        } => {
            let preprocessor =
                preprocessor.unwrap_or_else(|| config.artifacts.preprocessor_path.clone());
            let model = model.unwrap_or_else(|| config.artifacts.model_path.clone());
            let predictor = Predictor::load(&preprocessor, &model)?;
            let output = predict(&predictor, &read_request_input(&input)?)?;
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Commands::Run { input } => {
            let mut config = config;
            if let Some(input) = input {
                config.data.raw_path = input;
            }
            let summary = homeval_ml::run_all(&config).context("Pipeline run failed")?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Commands::Serve { host, port } => serve(&config, host, port).await,
        Commands::Runs { limit } => list_runs(&config, limit),
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                print!("{}", serde_yaml::to_string(&config)?);
                Ok(())
            }
            ConfigAction::Init { .. } => Ok(()),
        },
    }
}

fn init_config(path: Option<&Path>) -> anyhow::Result<()> {
    let path = path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), Path::to_path_buf);
    if path.exists() {
        println!("Configuration file already exists at: {}", path.display());
        return Ok(());
    }
    let yaml = serde_yaml::to_string(&PipelineConfig::default())?;
    homeval_core::persistence::atomic_write(&path, yaml.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Created default configuration at: {}", path.display());
    Ok(())
}

/// Accept inline JSON or a path to a JSON file.
fn read_request_input(input: &str) -> anyhow::Result<serde_json::Value> {
    let trimmed = input.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return serde_json::from_str(input).context("Request is not valid JSON");
    }
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read request file {input}"))?;
    serde_json::from_str(&text).with_context(|| format!("{input} is not valid JSON"))
}

/// A single object yields a full response, an array yields a list of prices.
fn predict(predictor: &Predictor, input: &serde_json::Value) -> anyhow::Result<serde_json::Value> {
    let schema = predictor.input_schema();
    match input {
        serde_json::Value::Array(items) => {
            let requests = items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    HousePredictionRequest::from_json(item, schema)
                        .with_context(|| format!("Request {i} is invalid"))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            Ok(serde_json::to_value(predictor.batch_predict(&requests)?)?)
        }
        other => {
            let request = HousePredictionRequest::from_json(other, schema)?;
            Ok(serde_json::to_value(predictor.predict(&request)?)?)
        }
    }
}

async fn serve(
    config: &PipelineConfig,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);
    let predictor = Predictor::load(
        &config.artifacts.preprocessor_path,
        &config.artifacts.model_path,
    )
    .context("Train a model before serving")?;
    inference::run(Arc::new(predictor), &host, port).await?;
    Ok(())
}

fn list_runs(config: &PipelineConfig, limit: usize) -> anyhow::Result<()> {
    let runs = ExperimentTracker::new(&config.artifacts.tracking_dir).list_runs()?;
    if runs.is_empty() {
        println!("No runs in {}", config.artifacts.tracking_dir.display());
        return Ok(());
    }
    for run in runs.iter().take(limit) {
        let rmse = run
            .metrics
            .as_ref()
            .map_or_else(|| "-".to_string(), |m| format!("{:.2}", m.rmse));
        println!(
            "{}  {:<20} {:<10} rmse={:<12} {}",
            run.id,
            run.name,
            format!("{:?}", run.status).to_lowercase(),
            rmse,
            run.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}
