//! Scripted stand-in for the external trainer.
//!
//! Parses the command line it is given and writes what a real trainer
//! would: the model file, a progress file named after it, translation output
//! for the current epoch and, when asked, a validation log.

#![allow(dead_code)]

use async_trait::async_trait;
use nmtrun_core::command::config::{
    AFTER_EPOCHS, MODEL, VALID_LOG, VALID_TRANSLATION_OUTPUT, VALID_METRICS, VALID_SETS,
};
use nmtrun_core::eval::render_output_path;
use nmtrun_core::{CommandConfig, NmtError, ProcessRunner, TrainingEngine};
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const REFERENCE: [&str; 4] = [
    "the cat sat on the mat",
    "a dog barked loudly",
    "it rained all day",
    "we went home early",
];

#[derive(Default)]
pub struct ScriptedTrainer {
    commands: Mutex<Vec<String>>,
    /// Model file content observed before each invocation.
    seen_models: Mutex<Vec<Option<String>>>,
    /// Reference lines reproduced per invocation; all of them once exhausted.
    correct_lines: Mutex<VecDeque<usize>>,
    fail_at: Option<usize>,
    valid_log: Option<String>,
}

impl ScriptedTrainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(self, correct_lines: &[usize]) -> Self {
        *self.correct_lines.lock().unwrap() = correct_lines.iter().copied().collect();
        self
    }

    pub fn failing_at(mut self, invocation: usize) -> Self {
        self.fail_at = Some(invocation);
        self
    }

    pub fn with_valid_log(mut self, content: &str) -> Self {
        self.valid_log = Some(content.to_string());
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn seen_models(&self) -> Vec<Option<String>> {
        self.seen_models.lock().unwrap().clone()
    }
}

/// Split `prog --a 1 2 --b` into `{a: [1, 2], b: []}`.
pub fn parse_flags(command: &str) -> BTreeMap<String, Vec<String>> {
    let mut flags = BTreeMap::new();
    let mut current: Option<String> = None;
    for token in command.split_whitespace().skip(1) {
        if let Some(name) = token.strip_prefix("--") {
            flags.insert(name.to_string(), Vec::new());
            current = Some(name.to_string());
        } else if let Some(name) = &current {
            flags.get_mut(name).unwrap().push(token.to_string());
        }
    }
    flags
}

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

#[async_trait]
impl ProcessRunner for ScriptedTrainer {
    async fn run(&self, command: &str) -> Result<(), NmtError> {
        let index = {
            let mut commands = self.commands.lock().unwrap();
            commands.push(command.to_string());
            commands.len() - 1
        };
        let flags = parse_flags(command);
        let model = flags.get(MODEL).and_then(|v| v.first()).map(PathBuf::from);
        self.seen_models.lock().unwrap().push(
            model
                .as_ref()
                .and_then(|m| std::fs::read_to_string(m).ok()),
        );

        if self.fail_at == Some(index) {
            return Err(NmtError::process(command, "exit status: 1"));
        }

        let epoch: u32 = flags
            .get(AFTER_EPOCHS)
            .and_then(|v| v.first())
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);

        if let Some(model) = &model {
            write(model, &format!("weights at epoch {epoch}"));
            let name = model.file_name().unwrap().to_string_lossy();
            write(&model.with_file_name(format!("{name}.progress.yml")), "transient");
        }

        if let Some(template) = flags.get(VALID_TRANSLATION_OUTPUT).and_then(|v| v.first()) {
            let correct = self
                .correct_lines
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(REFERENCE.len());
            let lines: Vec<&str> = REFERENCE
                .iter()
                .enumerate()
                .map(|(i, line)| if i < correct { *line } else { "no idea" })
                .collect();
            write(
                &render_output_path(template, epoch, None),
                &format!("{}\n", lines.join("\n")),
            );
        }

        if let (Some(path), Some(content)) =
            (flags.get(VALID_LOG).and_then(|v| v.first()), &self.valid_log)
        {
            write(Path::new(path), content);
        }
        Ok(())
    }
}

pub fn engine(trainer: &Arc<ScriptedTrainer>) -> TrainingEngine {
    TrainingEngine::with_runner(trainer.clone())
}

/// Reference data, translation output template and model path under `root`.
pub struct Workspace {
    pub root: PathBuf,
    pub model: PathBuf,
    pub reference: PathBuf,
    pub output_template: String,
    pub results_dir: PathBuf,
}

impl Workspace {
    pub fn new(root: &Path) -> Self {
        let reference = root.join("data").join("dev.es");
        write(&root.join("data").join("dev.gn"), "source\n");
        write(&reference, &format!("{}\n", REFERENCE.join("\n")));
        Self {
            root: root.to_path_buf(),
            model: root.join("model").join("model.npz"),
            reference,
            output_template: root.join("valid").join("out.{E}.txt").display().to_string(),
            results_dir: root.join("results"),
        }
    }

    /// Artificial-epoch configuration validating `metrics` every `interval` epochs.
    pub fn artificial(&self, after_epochs: u32, interval: u32, metrics: &[&str]) -> CommandConfig {
        let mut config = CommandConfig::new("marian")
            .with_flag(MODEL, [self.model.display().to_string()])
            .with_flag(AFTER_EPOCHS, [after_epochs.to_string()])
            .with_flag(
                VALID_SETS,
                [
                    self.root.join("data").join("dev.gn").display().to_string(),
                    self.reference.display().to_string(),
                ],
            )
            .with_flag(VALID_METRICS, ["cross-entropy", "translation"])
            .with_flag(VALID_TRANSLATION_OUTPUT, [self.output_template.clone()]);
        config.validate_each_epochs = Some(interval);
        config.validation_metrics = metrics.iter().map(|m| m.to_string()).collect();
        config.results_dir = self.results_dir.clone();
        config
    }

    pub fn single_shot(&self, after_epochs: u32) -> CommandConfig {
        let mut config = CommandConfig::new("marian")
            .with_flag(MODEL, [self.model.display().to_string()])
            .with_flag(AFTER_EPOCHS, [after_epochs.to_string()]);
        config.results_dir = self.results_dir.clone();
        config
    }
}
