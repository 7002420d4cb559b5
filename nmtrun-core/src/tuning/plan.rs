//! Turn a sweep into trainer configurations.

use crate::command::CommandConfig;
use crate::error::NmtError;
use crate::tuning::space::ParameterSet;
use crate::tuning::sweep::{TuningSpec, expand};
use serde::Serialize;

/// Configurations produced by a sweep, in execution order.
#[derive(Debug, Clone, Serialize)]
pub struct TuningPlan {
    pub run_id: String,
    pub seed: Option<u64>,
    pub configs: Vec<CommandConfig>,
}

/// Clone `base` and overlay one parameter set. Flags not in the set keep
/// the base values.
pub fn apply(base: &CommandConfig, set: &ParameterSet, run_id: String) -> CommandConfig {
    let mut config = base.clone();
    for (name, values) in set {
        config.flags.insert(name.clone(), values.clone());
    }
    config.run_id = Some(run_id);
    config
}

pub fn plan(base: &CommandConfig, spec: &TuningSpec) -> Result<TuningPlan, NmtError> {
    let expansion = expand(spec)?;
    let configs = expansion
        .combinations
        .iter()
        .enumerate()
        .map(|(i, set)| apply(base, set, format!("{}-{i}", spec.run_id)))
        .collect();
    Ok(TuningPlan {
        run_id: spec.run_id.clone(),
        seed: expansion.seed,
        configs,
    })
}
