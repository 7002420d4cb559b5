//! nmtrun CLI: drives an external NMT trainer through artificial epochs,
//! hyperparameter sweeps and pretrain → finetune handoffs.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// nmtrun: training-loop orchestration for NMT trainers
#[derive(Parser, Debug)]
#[command(name = "nmtrun", version, about, long_about = None)]
struct Cli {
    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Settings file merged over the user and workspace settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Train every configuration described by a run file
    Train {
        /// Run file (.toml or .json)
        run_file: PathBuf,
    },
    /// Print the configurations and commands a run file expands to
    Plan {
        /// Run file (.toml or .json)
        run_file: PathBuf,
    },
    /// Show which cached pretrained checkpoint finetuning would resume from
    SelectCheckpoint {
        /// Cache directory template with a `{}` epoch placeholder
        #[arg(short, long)]
        template: String,
        /// Pretraining epoch target
        #[arg(short, long)]
        epochs: u32,
    },
    /// Manage settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// List recorded runs
    Runs {
        /// Only show runs with this status (running, completed, stopped_early, failed)
        #[arg(short, long)]
        status: Option<String>,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create a default workspace settings file
    Init,
    /// Show the effective settings
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "nmtrun", "nmtrun")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "nmtrun.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace, cli.config.as_deref()).await
}
