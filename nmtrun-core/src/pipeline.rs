//! Run pipeline: expands a run plan into configurations and trains each one.

use crate::command::{CommandConfig, ShellRunner};
use crate::config::Settings;
use crate::error::NmtError;
use crate::finetune::{FinetuneSpec, Finetuner};
use crate::training::{
    RunRecord, RunRegistry, RunStatus, TrainingEngine, TrainingOutcome, TrainingReport,
};
use crate::tuning::{self, TuningSpec};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Everything needed to execute one run file.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub base: CommandConfig,
    pub tuning: Option<TuningSpec>,
    pub finetuning: Option<FinetuneSpec>,
}

impl RunPlan {
    pub fn single(base: CommandConfig) -> Self {
        Self {
            base,
            tuning: None,
            finetuning: None,
        }
    }

    /// Configurations in execution order: one per sweep combination, or
    /// just the base configuration.
    pub fn configs(&self) -> Result<Vec<CommandConfig>, NmtError> {
        match &self.tuning {
            Some(spec) => Ok(tuning::plan(&self.base, spec)?.configs),
            None => Ok(vec![self.base.clone()]),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub records: Vec<RunRecord>,
}

impl PipelineReport {
    pub fn stopped_early(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status == RunStatus::StoppedEarly)
            .count()
    }
}

pub struct Pipeline {
    engine: TrainingEngine,
    registry_path: Option<PathBuf>,
}

impl Pipeline {
    pub fn new(engine: TrainingEngine) -> Self {
        Self {
            engine,
            registry_path: None,
        }
    }

    /// Pipeline running trainer commands through the shell.
    pub fn from_settings(settings: &Settings) -> Self {
        let runner = ShellRunner::new()
            .with_timeout(settings.process_timeout_secs.map(Duration::from_secs));
        Self::new(TrainingEngine::with_runner(Arc::new(runner)))
            .with_registry(settings.registry_path.clone())
    }

    pub fn with_registry(mut self, path: impl Into<PathBuf>) -> Self {
        self.registry_path = Some(path.into());
        self
    }

    pub fn engine(&self) -> &TrainingEngine {
        &self.engine
    }

    /// Train every configuration of `plan` in order.
    ///
    /// The first failing configuration aborts the pipeline; its record is
    /// stored as failed and rows already written stay in the results store.
    pub async fn run(&self, plan: &RunPlan) -> Result<PipelineReport, NmtError> {
        let configs = plan.configs()?;
        let mut registry = match &self.registry_path {
            Some(path) => RunRegistry::load(path)?,
            None => RunRegistry::new(),
        };
        info!(configs = configs.len(), "Starting pipeline");
        if configs.len() > 1 && plan.base.keep_model_after && plan.finetuning.is_none() {
            warn!("keep_model_after is set: each sweep combination resumes from the previous combination's model");
        }

        let mut report = PipelineReport::default();
        for (index, config) in configs.iter().enumerate() {
            let mut record = RunRecord::start(config.run_id.clone(), &config.model_name(), &config.flags);
            registry.upsert(record.clone());
            self.persist(&registry)?;

            info!(index, run_id = ?config.run_id, "Running configuration");
            let result = self.train_one(config, plan.finetuning.as_ref()).await;

            match result {
                Ok(training) => {
                    record.invocations = training.invocations;
                    record.validation_points = training.validation_points;
                    record.last_epoch = training.last_epoch;
                    match &training.outcome {
                        TrainingOutcome::Completed => record.finish(RunStatus::Completed, None),
                        TrainingOutcome::StoppedEarly { epoch, decision } => record.finish(
                            RunStatus::StoppedEarly,
                            Some(format!("epoch {epoch}: {decision}")),
                        ),
                    }
                    registry.upsert(record.clone());
                    self.persist(&registry)?;
                    report.records.push(record);
                }
                Err(e) => {
                    error!(
                        index,
                        run_id = ?config.run_id,
                        before_training = e.is_setup_error(),
                        error = %e,
                        "Configuration failed"
                    );
                    record.finish(RunStatus::Failed, Some(e.to_string()));
                    registry.upsert(record);
                    self.persist(&registry)?;
                    return Err(e);
                }
            }
        }
        Ok(report)
    }

    async fn train_one(
        &self,
        config: &CommandConfig,
        finetuning: Option<&FinetuneSpec>,
    ) -> Result<TrainingReport, NmtError> {
        let Some(spec) = finetuning else {
            return self.engine.train(config).await;
        };
        let handoff = Finetuner::new(&self.engine).run(config, spec).await?;
        let mut training = handoff.finetuning;
        training.invocations += handoff.pretraining.invocations;
        Ok(training)
    }

    fn persist(&self, registry: &RunRegistry) -> Result<(), NmtError> {
        match &self.registry_path {
            Some(path) => registry.save(path),
            None => Ok(()),
        }
    }
}
