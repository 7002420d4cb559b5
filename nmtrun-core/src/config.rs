//! Configuration for nmtrun.
//!
//! Process-wide [`Settings`] use `figment` for layered configuration:
//! defaults -> user config file -> workspace config file -> environment ->
//! explicit overrides. They are loaded once at the entry point and passed
//! down. A [`RunFile`] (TOML or JSON) describes one training run: its flags,
//! artificial epoch interval, metrics, and optional tuning and finetuning
//! sections.

use crate::command::CommandConfig;
use crate::command::config::flag_values_from_json;
use crate::error::NmtError;
use crate::finetune::FinetuneSpec;
use crate::pipeline::RunPlan;
use crate::tuning::TuningSpec;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Process-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Trainer executable name.
    #[serde(default = "default_command_name")]
    pub command_name: String,
    /// Directory holding the trainer executable; empty resolves via `PATH`.
    #[serde(default)]
    pub command_path: PathBuf,
    /// Text placed between a flag and its values.
    #[serde(default = "default_flag_separator")]
    pub flag_separator: String,
    /// Directory of the CSV results stores.
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
    /// JSON run registry.
    #[serde(default = "default_registry_path")]
    pub registry_path: PathBuf,
    /// Kill a trainer invocation after this many seconds.
    #[serde(default)]
    pub process_timeout_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            command_name: default_command_name(),
            command_path: PathBuf::new(),
            flag_separator: default_flag_separator(),
            results_dir: default_results_dir(),
            registry_path: default_registry_path(),
            process_timeout_secs: None,
        }
    }
}

fn default_command_name() -> String {
    "marian".to_string()
}

fn default_flag_separator() -> String {
    " ".to_string()
}

fn default_results_dir() -> PathBuf {
    PathBuf::from(".nmtrun/results")
}

fn default_registry_path() -> PathBuf {
    PathBuf::from(".nmtrun/runs.json")
}

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "nmtrun", "nmtrun")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Workspace-level settings file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".nmtrun").join("config.toml")
}

/// Load settings from all layers.
///
/// `config_file`, when given, is merged after the workspace file.
pub fn load_settings(
    workspace: Option<&Path>,
    config_file: Option<&Path>,
    overrides: Option<&Settings>,
) -> Result<Settings, NmtError> {
    let mut figment = Figment::from(Serialized::defaults(Settings::default()));

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(file) = config_file {
        figment = figment.merge(Toml::file(file));
    }

    // NMTRUN_COMMAND_NAME, NMTRUN_RESULTS_DIR, ...
    figment = figment.merge(Env::prefixed("NMTRUN_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment
        .extract()
        .map_err(|e| NmtError::Settings(Box::new(e)))
}

/// Check whether any settings file exists (user-level or workspace-level).
pub fn settings_exist(workspace: Option<&Path>) -> bool {
    if user_config_path().is_some_and(|p| p.exists()) {
        return true;
    }
    workspace.is_some_and(|ws| workspace_config_path(ws).exists())
}

/// One training run as written by the user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunFile {
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub command_name: Option<String>,
    #[serde(default)]
    pub command_path: Option<PathBuf>,
    #[serde(default)]
    pub flag_separator: Option<String>,
    #[serde(default)]
    pub results_dir: Option<PathBuf>,
    /// Flag values: strings, numbers, booleans, arrays, or empty for switches.
    #[serde(default)]
    pub flags: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub train_from_epoch: u32,
    #[serde(default)]
    pub validate_each_epochs: Option<u32>,
    #[serde(default)]
    pub validation_metrics: Vec<String>,
    #[serde(default)]
    pub save_checkpoints: bool,
    #[serde(default)]
    pub keep_model_after: bool,
    #[serde(default)]
    pub tuning: Option<TuningSpec>,
    #[serde(default)]
    pub finetuning: Option<FinetuneSpec>,
}

impl RunFile {
    /// Load a run file; `.json` files are parsed as JSON, anything else as TOML.
    pub fn load(path: &Path) -> Result<Self, NmtError> {
        if !path.is_file() {
            return Err(NmtError::config(format!(
                "run file {} does not exist",
                path.display()
            )));
        }
        let figment = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Figment::from(Json::file(path)),
            _ => Figment::from(Toml::file(path)),
        };
        figment
            .extract()
            .map_err(|e| NmtError::config(format!("invalid run file {}: {e}", path.display())))
    }

    /// Build the trainer configuration, filling gaps from `settings`.
    pub fn command_config(&self, settings: &Settings) -> Result<CommandConfig, NmtError> {
        let flags = self
            .flags
            .iter()
            .map(|(name, value)| Ok::<_, NmtError>((name.clone(), flag_values_from_json(name, value)?)))
            .collect::<Result<_, _>>()?;

        Ok(CommandConfig {
            command_name: self
                .command_name
                .clone()
                .unwrap_or_else(|| settings.command_name.clone()),
            command_path: self
                .command_path
                .clone()
                .unwrap_or_else(|| settings.command_path.clone()),
            flag_separator: self
                .flag_separator
                .clone()
                .unwrap_or_else(|| settings.flag_separator.clone()),
            flags,
            train_from_epoch: self.train_from_epoch,
            validate_each_epochs: self.validate_each_epochs,
            validation_metrics: self.validation_metrics.clone(),
            save_checkpoints: self.save_checkpoints,
            results_dir: self
                .results_dir
                .clone()
                .unwrap_or_else(|| settings.results_dir.clone()),
            keep_model_after: self.keep_model_after,
            run_id: self
                .run_id
                .clone()
                .or_else(|| self.tuning.as_ref().map(|t| t.run_id.clone())),
        })
    }

    pub fn into_plan(self, settings: &Settings) -> Result<RunPlan, NmtError> {
        Ok(RunPlan {
            base: self.command_config(settings)?,
            tuning: self.tuning,
            finetuning: self.finetuning,
        })
    }
}
