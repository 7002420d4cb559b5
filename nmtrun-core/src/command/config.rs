//! Trainer invocation configuration.
//!
//! A [`CommandConfig`] describes one trainer invocation: which binary to run,
//! the flag mapping handed to it, and the orchestration settings (artificial
//! epoch interval, validation metrics, checkpoint and cleanup toggles) that
//! the training engine reads. Every value is owned, so `clone()` is a deep
//! copy and mutating a clone never leaks into its origin.

use crate::error::NmtError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Flag name → ordered values. An empty list renders as a bare switch.
pub type Flags = BTreeMap<String, Vec<String>>;

pub const AFTER_EPOCHS: &str = "after-epochs";
pub const AFTER_BATCHES: &str = "after-batches";
pub const EARLY_STOPPING: &str = "early-stopping";
pub const MODEL: &str = "model";
pub const NO_RESTORE_CORPUS: &str = "no-restore-corpus";
pub const TRAIN_SETS: &str = "train-sets";
pub const VALID_LOG: &str = "valid-log";
pub const VALID_METRICS: &str = "valid-metrics";
pub const VALID_SETS: &str = "valid-sets";
pub const VALID_TRANSLATION_OUTPUT: &str = "valid-translation-output";

/// Trainer-side metric that makes the trainer write translation output.
pub const TRANSLATION_METRIC: &str = "translation";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandConfig {
    pub command_name: String,
    #[serde(default)]
    pub command_path: PathBuf,
    #[serde(default = "default_flag_separator")]
    pub flag_separator: String,
    #[serde(default)]
    pub flags: Flags,
    /// Epoch the trainer resumes from; artificial epochs start at
    /// `train_from_epoch / validate_each_epochs`.
    #[serde(default)]
    pub train_from_epoch: u32,
    /// Artificial epoch interval. `None` selects single-shot training.
    #[serde(default)]
    pub validate_each_epochs: Option<u32>,
    #[serde(default)]
    pub validation_metrics: Vec<String>,
    #[serde(default)]
    pub save_checkpoints: bool,
    #[serde(default)]
    pub results_dir: PathBuf,
    /// Skip the post-run model directory cleanup.
    #[serde(default)]
    pub keep_model_after: bool,
    #[serde(default)]
    pub run_id: Option<String>,
}

fn default_flag_separator() -> String {
    " ".to_string()
}

impl CommandConfig {
    pub fn new(command_name: impl Into<String>) -> Self {
        Self {
            command_name: command_name.into(),
            command_path: PathBuf::new(),
            flag_separator: default_flag_separator(),
            flags: Flags::new(),
            train_from_epoch: 0,
            validate_each_epochs: None,
            validation_metrics: Vec::new(),
            save_checkpoints: false,
            results_dir: PathBuf::new(),
            keep_model_after: false,
            run_id: None,
        }
    }

    pub fn with_flag<I, S>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_flag(name, values);
        self
    }

    pub fn set_flag<I, S>(&mut self, name: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags
            .insert(name.to_string(), values.into_iter().map(Into::into).collect());
    }

    pub fn remove_flag(&mut self, name: &str) -> Option<Vec<String>> {
        self.flags.remove(name)
    }

    pub fn flag_values(&self, name: &str) -> Option<&[String]> {
        self.flags.get(name).map(Vec::as_slice)
    }

    /// First value of a flag.
    pub fn flag(&self, name: &str) -> Option<&str> {
        self.flags
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn has_flag(&self, name: &str) -> bool {
        self.flags.contains_key(name)
    }

    /// Parse the first value of a flag as an integer, failing if absent.
    pub fn required_u32(&self, name: &str) -> Result<u32, NmtError> {
        let raw = self
            .flag(name)
            .ok_or_else(|| NmtError::config(format!("required flag '{name}' is not set")))?;
        parse_u32(name, raw)
    }

    /// Parse the first value of a flag as an integer if present.
    pub fn optional_u32(&self, name: &str) -> Result<Option<u32>, NmtError> {
        self.flag(name).map(|raw| parse_u32(name, raw)).transpose()
    }

    pub fn model_path(&self) -> Option<PathBuf> {
        self.flag(MODEL).map(PathBuf::from)
    }

    /// Model file name used to label result rows.
    pub fn model_name(&self) -> String {
        self.model_path()
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.command_name.clone())
    }

    /// Results store shared by every run of this command.
    pub fn results_file(&self) -> PathBuf {
        self.results_dir.join(format!("{}.csv", self.command_name))
    }

    pub fn is_artificial_epoch_training(&self) -> bool {
        self.validate_each_epochs.is_some()
    }
}

fn parse_u32(name: &str, raw: &str) -> Result<u32, NmtError> {
    raw.trim()
        .parse()
        .map_err(|_| NmtError::config(format!("flag '{name}' expects an integer, got '{raw}'")))
}

/// Normalize a JSON value into flag values.
///
/// Strings are taken verbatim, numbers and booleans are stringified, arrays
/// become multi-valued flags and `null` becomes a bare switch.
pub fn flag_values_from_json(name: &str, value: &serde_json::Value) -> Result<Vec<String>, NmtError> {
    use serde_json::Value;
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Number(n) => Ok(vec![n.to_string()]),
        Value::Bool(b) => Ok(vec![b.to_string()]),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                Value::Bool(b) => Ok(b.to_string()),
                other => Err(NmtError::config(format!(
                    "flag '{name}' has unsupported nested value {other}"
                ))),
            })
            .collect(),
        Value::Object(_) => Err(NmtError::config(format!(
            "flag '{name}' cannot be an object"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> CommandConfig {
        CommandConfig::new("marian")
            .with_flag(MODEL, ["models/run/model.npz"])
            .with_flag(AFTER_EPOCHS, ["10"])
            .with_flag(VALID_SETS, ["valid.gn", "valid.es"])
    }

    #[test]
    fn test_clone_is_independent() {
        let original = sample();
        let mut copy = original.clone();
        assert_eq!(copy, original);

        copy.flags.get_mut(VALID_SETS).unwrap().push("extra".into());
        copy.set_flag(AFTER_EPOCHS, ["5"]);
        assert_eq!(original.flag_values(VALID_SETS).unwrap().len(), 2);
        assert_eq!(original.flag(AFTER_EPOCHS), Some("10"));

        let mut original = original;
        original.remove_flag(MODEL);
        assert!(copy.has_flag(MODEL));
    }

    #[test]
    fn test_required_u32() {
        let config = sample();
        assert_eq!(config.required_u32(AFTER_EPOCHS).unwrap(), 10);
        assert!(config.required_u32(AFTER_BATCHES).is_err());
        let bad = config.with_flag(AFTER_EPOCHS, ["ten"]);
        assert!(matches!(
            bad.required_u32(AFTER_EPOCHS),
            Err(NmtError::Config(_))
        ));
    }

    #[test]
    fn test_model_name_and_results_file() {
        let mut config = sample();
        config.results_dir = PathBuf::from("results");
        assert_eq!(config.model_name(), "model.npz");
        assert_eq!(config.results_file(), PathBuf::from("results/marian.csv"));

        config.remove_flag(MODEL);
        assert_eq!(config.model_name(), "marian");
    }

    #[test]
    fn test_flag_values_from_json() {
        assert_eq!(
            flag_values_from_json("lr", &json!(0.0003)).unwrap(),
            vec!["0.0003"]
        );
        assert_eq!(
            flag_values_from_json("valid-sets", &json!(["a", "b"])).unwrap(),
            vec!["a", "b"]
        );
        assert!(flag_values_from_json("tied", &json!(null)).unwrap().is_empty());
        assert!(flag_values_from_json("x", &json!({"a": 1})).is_err());
    }
}
