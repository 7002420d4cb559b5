//! Hyperparameter tuning: search-space files, grid/random expansion, planning.

pub mod plan;
pub mod space;
pub mod sweep;

pub use plan::{TuningPlan, apply, plan};
pub use space::{ParameterGrid, ParameterSet};
pub use sweep::{SearchSpace, SearchStrategy, TuningSpec};
