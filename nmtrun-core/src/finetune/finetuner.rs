//! Pretraining → finetuning handoff.
//!
//! The model is first brought to `epochs` on the augmented data, resuming
//! from the best-fitting cached checkpoint, then that state is cached and
//! training continues on the full data for the configured `after-epochs`.

use crate::command::CommandConfig;
use crate::command::config::{AFTER_EPOCHS, TRAIN_SETS};
use crate::error::NmtError;
use crate::finetune::selector::{CachedCheckpoint, CheckpointCache};
use crate::training::{TrainOptions, TrainingEngine, TrainingReport};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinetuneSpec {
    /// Pretraining epoch target.
    pub epochs: u32,
    #[serde(default)]
    pub augmented_sets: Vec<String>,
    #[serde(default)]
    pub full_sets: Vec<String>,
    /// Cache directory template with a `{}` epoch placeholder.
    pub cache_dir_template: String,
}

#[derive(Debug, Clone)]
pub struct FinetuneReport {
    pub selected: CachedCheckpoint,
    pub cached: PathBuf,
    pub pretraining: TrainingReport,
    pub finetuning: TrainingReport,
}

pub struct Finetuner<'a> {
    engine: &'a TrainingEngine,
}

impl<'a> Finetuner<'a> {
    pub fn new(engine: &'a TrainingEngine) -> Self {
        Self { engine }
    }

    pub async fn run(
        &self,
        config: &CommandConfig,
        spec: &FinetuneSpec,
    ) -> Result<FinetuneReport, NmtError> {
        let model = config
            .model_path()
            .ok_or_else(|| NmtError::config("finetuning requires the 'model' flag"))?;
        let finetune_epochs = config.required_u32(AFTER_EPOCHS)?;
        let total = spec.epochs.checked_add(finetune_epochs).ok_or_else(|| {
            NmtError::config(format!(
                "finetuning past epoch {} by {finetune_epochs} epochs overflows the epoch counter",
                spec.epochs
            ))
        })?;
        let cache = CheckpointCache::new(spec.cache_dir_template.clone())?;
        let selected = cache.select(spec.epochs)?;

        cache.restore_into(&selected, &model)?;

        let mut pretrain = config.clone();
        if !spec.augmented_sets.is_empty() {
            pretrain.set_flag(TRAIN_SETS, spec.augmented_sets.iter().cloned());
        }
        pretrain.set_flag(AFTER_EPOCHS, [spec.epochs.to_string()]);
        pretrain.train_from_epoch = selected.epoch;
        pretrain.validate_each_epochs = None;
        pretrain.keep_model_after = true;
        info!(
            from = selected.epoch,
            to = spec.epochs,
            "Pretraining on augmented data"
        );
        let pretraining = self
            .engine
            .train_with(&pretrain, TrainOptions { validate: false })
            .await?;

        let cached = cache.store(&model, spec.epochs)?;

        let mut finetune = config.clone();
        if !spec.full_sets.is_empty() {
            finetune.set_flag(TRAIN_SETS, spec.full_sets.iter().cloned());
        }
        finetune.set_flag(AFTER_EPOCHS, [total.to_string()]);
        finetune.train_from_epoch = spec.epochs;
        info!(from = spec.epochs, to = total, "Finetuning on full data");
        let finetuning = self.engine.train(&finetune).await?;

        Ok(FinetuneReport {
            selected,
            cached,
            pretraining,
            finetuning,
        })
    }
}
