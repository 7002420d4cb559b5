//! # nmtrun Core
//!
//! Orchestration library for an external neural machine translation trainer.
//! Provides the artificial-epoch training loop with early stopping,
//! grid and random hyperparameter search, the pretrained checkpoint
//! selector for finetuning, validation scoring and the CSV results store.

pub mod command;
pub mod config;
pub mod error;
pub mod eval;
pub mod finetune;
pub mod pipeline;
pub mod training;
pub mod tuning;

// Re-export commonly used types at the crate root.
pub use command::{CommandBuilder, CommandConfig, FlagCommandBuilder, Flags, ProcessRunner, ShellRunner};
pub use config::{RunFile, Settings, load_settings};
pub use error::{NmtError, Result};
pub use eval::{ReferenceValidator, ResultRow, ResultsStore, Scorer, Validator};
pub use finetune::{CheckpointCache, FinetuneSpec, Finetuner};
pub use pipeline::{Pipeline, PipelineReport, RunPlan};
pub use training::{
    EarlyStopping, RunRecord, RunRegistry, RunStatus, StopDecision, TrainingEngine,
    TrainingOutcome, TrainingReport,
};
pub use tuning::{SearchStrategy, TuningPlan, TuningSpec};
