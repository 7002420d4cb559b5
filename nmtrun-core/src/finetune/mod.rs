//! Pretrained checkpoint selection and the pretrain → finetune handoff.

pub mod finetuner;
pub mod selector;

pub use finetuner::{FinetuneReport, FinetuneSpec, Finetuner};
pub use selector::{CachedCheckpoint, CheckpointCache};
