//! homeval CLI: run the house price pipeline stage by stage or end to end.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// homeval: validate, clean, featurize, train and serve house price models
#[derive(Parser, Debug)]
#[command(name = "homeval", version, about, long_about = None)]
struct Cli {
    /// Configuration file (YAML, TOML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Validate and clean a raw dataset
    Process {
        /// Raw CSV (defaults to data.raw_path)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Cleaned CSV to write (defaults to data.cleaned_path)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Fit the feature transformer and write the featured dataset
    Engineer {
        /// Cleaned CSV (defaults to data.cleaned_path)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Featured CSV to write (defaults to data.featured_path)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Where to save the fitted transformer (defaults to artifacts.preprocessor_path)
        #[arg(long)]
        preprocessor: Option<PathBuf>,
    },
    /// Train a model on a featured dataset
    Train {
        /// Featured CSV (defaults to data.featured_path)
        #[arg(long)]
        data: Option<PathBuf>,
        /// Fitted transformer (defaults to artifacts.preprocessor_path)
        #[arg(long)]
        preprocessor: Option<PathBuf>,
        /// Where to save the model (defaults to artifacts.model_path)
        #[arg(long)]
        output_model_path: Option<PathBuf>,
    },
    /// Price one or more houses
    Predict {
        /// JSON object or array of objects, inline or as a file path
        input: String,
        /// Fitted transformer (defaults to artifacts.preprocessor_path)
        #[arg(long)]
        preprocessor: Option<PathBuf>,
        /// Trained model (defaults to artifacts.model_path)
        #[arg(long)]
        model: Option<PathBuf>,
    },
    /// Run process, engineer and train with configured paths
    Run {
        /// Raw CSV (defaults to data.raw_path)
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Serve the prediction API
    Serve {
        /// Bind address (defaults to server.host)
        #[arg(long)]
        host: Option<String>,
        /// Port (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// List tracked training runs, newest first
    Runs {
        /// Maximum number of runs to show
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Print the resolved configuration as YAML
    Show,
    /// Write the default configuration to a file
    Init {
        /// Destination (defaults to configs/model_config.yaml)
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let level = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(filter);

    let log_dir = directories::ProjectDirs::from("dev", "homeval", "homeval")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "homeval.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    commands::handle_command(cli.command, cli.config.as_deref()).await
}
