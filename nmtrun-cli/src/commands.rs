//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use nmtrun_core::config::{load_settings, settings_exist, workspace_config_path};
use nmtrun_core::{
    CheckpointCache, CommandBuilder, FlagCommandBuilder, Pipeline, RunFile, RunPlan,
    RunRegistry, RunStatus, Settings,
};
use std::path::Path;

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    config: Option<&Path>,
) -> anyhow::Result<()> {
    match command {
        Commands::Train { run_file } => handle_train(&run_file, workspace, config).await,
        Commands::Plan { run_file } => handle_plan(&run_file, workspace, config),
        Commands::SelectCheckpoint { template, epochs } => {
            handle_select_checkpoint(&template, epochs)
        }
        Commands::Config { action } => handle_config(action, workspace, config),
        Commands::Runs { status } => handle_runs(status.as_deref(), workspace, config),
    }
}

fn settings(workspace: &Path, config: Option<&Path>) -> anyhow::Result<Settings> {
    load_settings(Some(workspace), config, None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))
}

fn load_plan(run_file: &Path, settings: &Settings) -> anyhow::Result<RunPlan> {
    Ok(RunFile::load(run_file)?.into_plan(settings)?)
}

async fn handle_train(
    run_file: &Path,
    workspace: &Path,
    config: Option<&Path>,
) -> anyhow::Result<()> {
    let settings = settings(workspace, config)?;
    let plan = load_plan(run_file, &settings)?;
    let pipeline = Pipeline::from_settings(&settings);
    let report = pipeline.run(&plan).await?;

    for record in &report.records {
        println!(
            "  {} [{}] {} invocation(s), {} validation point(s){}",
            record.run_id.as_deref().unwrap_or(&record.model),
            record.status,
            record.invocations,
            record.validation_points,
            record
                .message
                .as_deref()
                .map(|m| format!(": {m}"))
                .unwrap_or_default()
        );
    }
    println!(
        "Trained {} configuration(s), {} stopped early. Results: {}",
        report.records.len(),
        report.stopped_early(),
        plan.base.results_file().display()
    );
    Ok(())
}

/// JSON description of what a run plan would execute.
pub fn plan_json(plan: &RunPlan) -> anyhow::Result<serde_json::Value> {
    let (run_id, seed, configs) = match &plan.tuning {
        Some(spec) => {
            let tuning = nmtrun_core::tuning::plan(&plan.base, spec)?;
            (Some(tuning.run_id), tuning.seed, tuning.configs)
        }
        None => (plan.base.run_id.clone(), None, vec![plan.base.clone()]),
    };
    let commands: Vec<String> = configs
        .iter()
        .map(|config| FlagCommandBuilder.build(config))
        .collect();
    Ok(serde_json::json!({
        "run_id": run_id,
        "seed": seed,
        "finetuning": plan.finetuning,
        "results_file": plan.base.results_file(),
        "configs": configs,
        "commands": commands,
    }))
}

fn handle_plan(run_file: &Path, workspace: &Path, config: Option<&Path>) -> anyhow::Result<()> {
    let settings = settings(workspace, config)?;
    let plan = load_plan(run_file, &settings)?;
    println!("{}", serde_json::to_string_pretty(&plan_json(&plan)?)?);
    Ok(())
}

fn handle_select_checkpoint(template: &str, epochs: u32) -> anyhow::Result<()> {
    let cache = CheckpointCache::new(template)?;
    let cached = cache.list()?;
    let selected = cache.select(epochs)?;
    println!(
        "Selected epoch {} at {} ({} cached checkpoint(s))",
        selected.epoch,
        selected.dir.display(),
        cached.len()
    );
    Ok(())
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = workspace_config_path(workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let toml_str = toml::to_string_pretty(&Settings::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            if !settings_exist(Some(workspace)) && config.is_none() {
                tracing::info!("No settings file found; showing defaults");
            }
            let settings = settings(workspace, config)?;
            println!("{}", toml::to_string_pretty(&settings)?);
            Ok(())
        }
    }
}

fn parse_status(status: &str) -> anyhow::Result<RunStatus> {
    match status {
        "running" => Ok(RunStatus::Running),
        "completed" => Ok(RunStatus::Completed),
        "stopped_early" | "stopped-early" => Ok(RunStatus::StoppedEarly),
        "failed" => Ok(RunStatus::Failed),
        other => anyhow::bail!("Unknown run status: '{}'", other),
    }
}

/// First eight characters of a run id, or the whole id when shorter.
fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn handle_runs(status: Option<&str>, workspace: &Path, config: Option<&Path>) -> anyhow::Result<()> {
    let settings = settings(workspace, config)?;
    let registry = RunRegistry::load(&settings.registry_path)?;
    let runs: Vec<_> = match status {
        Some(status) => registry.list_by_status(&parse_status(status)?),
        None => registry.runs.iter().collect(),
    };
    if runs.is_empty() {
        println!("No runs recorded in {}", settings.registry_path.display());
        return Ok(());
    }
    for run in runs {
        println!(
            "  {}  {:<24} {:<14} epoch {:<6} {}",
            short_id(&run.id),
            run.run_id.as_deref().unwrap_or(&run.model),
            run.status.to_string(),
            run.last_epoch
                .map(|e| e.to_string())
                .unwrap_or_else(|| "-".into()),
            run.started_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}
