//! Training infrastructure: the artificial-epoch engine, early stopping,
//! checkpoint files and the run registry.

pub mod checkpoint;
pub mod early_stopping;
pub mod engine;
pub mod experiment;

pub use checkpoint::{cleanup_model_dir, rename_checkpoint, save_checkpoint_copy};
pub use early_stopping::{EarlyStopping, MetricHistory, StopDecision};
pub use engine::{TrainOptions, TrainingEngine, TrainingOutcome, TrainingReport};
pub use experiment::{RunRecord, RunRegistry, RunStatus};
