//! Training loop engine.
//!
//! Drives the external trainer either once (single-shot) or in artificial
//! epochs: the trainer is stopped every `validate_each_epochs` epochs, the
//! model is optionally checkpointed and validated, and the trainer is resumed
//! with a larger `after-epochs` budget until the total budget or an early stop
//! is reached.

use crate::command::config::{
    AFTER_BATCHES, AFTER_EPOCHS, CommandConfig, EARLY_STOPPING, NO_RESTORE_CORPUS,
    TRANSLATION_METRIC, VALID_LOG, VALID_METRICS, VALID_SETS, VALID_TRANSLATION_OUTPUT,
};
use crate::command::{CommandBuilder, FlagCommandBuilder, ProcessRunner};
use crate::error::NmtError;
use crate::eval::{
    ReferenceValidator, ValidationRequest, ValidationSource, Validator, render_output_path,
};
use crate::training::checkpoint::{cleanup_model_dir, save_checkpoint_copy};
use crate::training::early_stopping::{EarlyStopping, MetricHistory, StopDecision};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Flags removed before resuming an artificial epoch.
pub const RESUME_BLOCKING_FLAGS: &[&str] = &[NO_RESTORE_CORPUS];

/// Passed to the trainer so its own early stopping never fires first.
const TRAINER_EARLY_STOPPING: &str = "10000";

#[derive(Debug, Clone, PartialEq)]
pub enum TrainingOutcome {
    Completed,
    StoppedEarly { epoch: u32, decision: StopDecision },
}

#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub outcome: TrainingOutcome,
    pub invocations: usize,
    pub validation_points: usize,
    pub last_epoch: Option<u32>,
    pub history: Option<MetricHistory>,
    pub checkpoints: Vec<PathBuf>,
}

impl TrainingReport {
    fn new() -> Self {
        Self {
            outcome: TrainingOutcome::Completed,
            invocations: 0,
            validation_points: 0,
            last_epoch: None,
            history: None,
            checkpoints: Vec::new(),
        }
    }

    pub fn stopped_early(&self) -> bool {
        matches!(self.outcome, TrainingOutcome::StoppedEarly { .. })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TrainOptions {
    /// Allow validation when the configuration enables it.
    pub validate: bool,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self { validate: true }
    }
}

/// Decide whether a run records validation scores.
///
/// Artificial-epoch runs need the trainer to emit translations
/// (`translation` among its metrics, an output template) and at least one
/// metric to score them with. Single-shot runs read the trainer's log.
pub fn validation_enabled(
    artificial_epoch_training: bool,
    model_metrics: &[String],
    validation_metrics: &[String],
    translation_output: Option<&str>,
    validation_log: Option<&str>,
) -> bool {
    if artificial_epoch_training {
        model_metrics.iter().any(|m| m == TRANSLATION_METRIC)
            && !validation_metrics.is_empty()
            && translation_output.is_some()
    } else {
        validation_log.is_some()
    }
}

/// Remove flags that would make a resumed trainer restart its corpus.
///
/// Only the first entry of `flags` is acted on; later entries are ignored.
pub fn strip_resume_blockers(config: &mut CommandConfig, flags: &[&str]) {
    if let Some(flag) = flags.first() {
        if config.remove_flag(flag).is_some() {
            debug!(flag, "Removed flag before resuming");
        }
    }
}

pub struct TrainingEngine {
    builder: Arc<dyn CommandBuilder>,
    runner: Arc<dyn ProcessRunner>,
    validator: Arc<dyn Validator>,
}

impl TrainingEngine {
    pub fn new(
        builder: Arc<dyn CommandBuilder>,
        runner: Arc<dyn ProcessRunner>,
        validator: Arc<dyn Validator>,
    ) -> Self {
        Self {
            builder,
            runner,
            validator,
        }
    }

    /// Engine with the built-in command builder and validator.
    pub fn with_runner(runner: Arc<dyn ProcessRunner>) -> Self {
        Self::new(
            Arc::new(FlagCommandBuilder),
            runner,
            Arc::new(ReferenceValidator),
        )
    }

    pub async fn train(&self, config: &CommandConfig) -> Result<TrainingReport, NmtError> {
        self.train_with(config, TrainOptions::default()).await
    }

    pub async fn train_with(
        &self,
        config: &CommandConfig,
        options: TrainOptions,
    ) -> Result<TrainingReport, NmtError> {
        let config = config.clone();
        let model_metrics = config.flag_values(VALID_METRICS).unwrap_or_default();
        let validate = options.validate
            && validation_enabled(
                config.is_artificial_epoch_training(),
                model_metrics,
                &config.validation_metrics,
                config.flag(VALID_TRANSLATION_OUTPUT),
                config.flag(VALID_LOG),
            );

        let report = match config.validate_each_epochs {
            None => self.single_shot(&config, validate).await?,
            Some(interval) => self.artificial_epochs(&config, interval, validate).await?,
        };

        if !config.keep_model_after {
            if let Some(model) = config.model_path() {
                cleanup_model_dir(&model)?;
            }
        }
        Ok(report)
    }

    async fn single_shot(
        &self,
        config: &CommandConfig,
        validate: bool,
    ) -> Result<TrainingReport, NmtError> {
        let mut report = TrainingReport::new();
        let started = Instant::now();
        let command = self.builder.build(config);
        info!(run_id = ?config.run_id, "Starting single-shot training");
        self.runner.run(&command).await?;
        report.invocations = 1;

        if validate {
            if let Some(log) = config.flag(VALID_LOG) {
                let request = ValidationRequest {
                    model_name: config.model_name(),
                    parameters: &config.flags,
                    metrics: &config.validation_metrics,
                    source: ValidationSource::Log(PathBuf::from(log)),
                    epoch: None,
                    duration: started.elapsed(),
                    results_file: config.results_file(),
                };
                self.validator.validate(&request)?;
                report.validation_points = 1;
            }
        }
        Ok(report)
    }

    async fn artificial_epochs(
        &self,
        config: &CommandConfig,
        interval: u32,
        validate: bool,
    ) -> Result<TrainingReport, NmtError> {
        if interval == 0 {
            return Err(NmtError::config("validate_each_epochs must be positive"));
        }
        let total_epochs = config.required_u32(AFTER_EPOCHS)?;
        let first_step = config.train_from_epoch / interval;
        let last_step = total_epochs / interval;

        let model = config.model_path();
        if config.save_checkpoints && model.is_none() {
            return Err(NmtError::config(
                "save_checkpoints requires the 'model' flag",
            ));
        }

        // The trainer sees `invocation`; result rows log `logged`.
        let mut invocation = config.clone();
        let mut logged = config.flags.clone();

        let policy = match config.optional_u32(EARLY_STOPPING)? {
            Some(0) => return Err(NmtError::config("early-stopping window must be positive")),
            Some(window) => {
                invocation.set_flag(EARLY_STOPPING, [TRAINER_EARLY_STOPPING]);
                Some(EarlyStopping::new(window as usize))
            }
            None => None,
        };
        let mut history = match (&policy, config.validation_metrics.first()) {
            (Some(_), Some(metric)) => Some(MetricHistory::new(metric.clone())),
            (Some(_), None) => {
                warn!("early-stopping is set but no validation metric is configured");
                None
            }
            _ => None,
        };
        if history.is_some() && !validate {
            warn!("early-stopping is set but validation is disabled; it will never trigger");
        }

        let reference = config
            .flag_values(VALID_SETS)
            .and_then(|sets| sets.get(1))
            .map(PathBuf::from);
        let batches = config.flag(AFTER_BATCHES).map(str::to_string);

        info!(
            run_id = ?config.run_id,
            interval,
            total_epochs,
            first_epoch = interval * (first_step + 1),
            "Starting artificial-epoch training"
        );

        let mut report = TrainingReport::new();
        for step in first_step..last_step {
            let epoch = interval * (step + 1);
            if step > first_step {
                strip_resume_blockers(&mut invocation, RESUME_BLOCKING_FLAGS);
            }
            invocation.set_flag(AFTER_EPOCHS, [epoch.to_string()]);
            logged.insert(AFTER_EPOCHS.to_string(), vec![epoch.to_string()]);

            let started = Instant::now();
            let command = self.builder.build(&invocation);
            info!(epoch, "Training until artificial epoch");
            self.runner.run(&command).await?;
            let duration = started.elapsed();
            report.invocations += 1;
            report.last_epoch = Some(epoch);

            if config.save_checkpoints {
                if let Some(model) = &model {
                    report.checkpoints.push(save_checkpoint_copy(model, epoch)?);
                }
            }

            if validate {
                let template = config.flag(VALID_TRANSLATION_OUTPUT).unwrap_or_default();
                let reference = reference.clone().ok_or_else(|| {
                    NmtError::validation("'valid-sets' needs a source and a reference file")
                })?;
                let request = ValidationRequest {
                    model_name: config.model_name(),
                    parameters: &logged,
                    metrics: &config.validation_metrics,
                    source: ValidationSource::Translation {
                        output: render_output_path(template, epoch, batches.as_deref()),
                        reference,
                    },
                    epoch: Some(epoch),
                    duration,
                    results_file: config.results_file(),
                };
                let scores = self.validator.validate(&request)?;
                report.validation_points += 1;

                if let Some(history) = history.as_mut() {
                    if let Some(values) = scores.get(&history.metric) {
                        history.extend(values);
                    }
                }
            }

            if let (Some(policy), Some(history)) = (&policy, &history) {
                let decision = policy.check(history.values());
                if decision.should_stop() {
                    info!(epoch, metric = %history.metric, "Early stopping: {decision}");
                    report.outcome = TrainingOutcome::StoppedEarly { epoch, decision };
                    break;
                }
            }
        }

        report.history = history;
        Ok(report)
    }
}
