//! Hyperparameter sweep strategies.

use crate::error::NmtError;
use crate::tuning::space::{ParameterGrid, ParameterSet, load_fixed};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    #[default]
    #[serde(alias = "gridsearch")]
    Grid,
    #[serde(alias = "randomsearch")]
    Random,
}

/// What to search over and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningSpec {
    pub run_id: String,
    #[serde(default)]
    pub grid_files: Vec<PathBuf>,
    #[serde(default)]
    pub params_files: Vec<PathBuf>,
    #[serde(default)]
    pub strategy: SearchStrategy,
    #[serde(default)]
    pub seed: Option<u64>,
    /// Random search only: maximum number of sampled combinations.
    #[serde(default)]
    pub max_iters: Option<usize>,
}

/// Loaded search space: grids expand, fixed files contribute one set each.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSpace {
    pub grids: Vec<ParameterGrid>,
    pub fixed: Vec<ParameterSet>,
}

impl SearchSpace {
    pub fn load(spec: &TuningSpec) -> Result<Self, NmtError> {
        let grids = spec
            .grid_files
            .iter()
            .map(|path| ParameterGrid::load(path))
            .collect::<Result<Vec<_>, _>>()?;
        let fixed = spec
            .params_files
            .iter()
            .map(|path| load_fixed(path))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { grids, fixed })
    }

    /// Every combination: each grid's product in file order, then the fixed sets.
    pub fn combinations(&self) -> Vec<ParameterSet> {
        self.grids
            .iter()
            .flat_map(ParameterGrid::combinations)
            .chain(self.fixed.iter().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.grids.iter().map(ParameterGrid::len).sum::<usize>() + self.fixed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Draw up to `cap` distinct combinations, in sampled order.
///
/// The same seed, pool and cap always produce the same sequence.
pub fn sample(pool: &[ParameterSet], seed: u64, cap: Option<usize>) -> Vec<ParameterSet> {
    let amount = cap.unwrap_or(pool.len()).min(pool.len());
    let mut rng = StdRng::seed_from_u64(seed);
    rand::seq::index::sample(&mut rng, pool.len(), amount)
        .into_iter()
        .map(|i| pool[i].clone())
        .collect()
}

/// Expanded sweep, with the seed actually used for random search.
#[derive(Debug, Clone, PartialEq)]
pub struct Expansion {
    pub combinations: Vec<ParameterSet>,
    pub seed: Option<u64>,
}

pub fn expand(spec: &TuningSpec) -> Result<Expansion, NmtError> {
    let space = SearchSpace::load(spec)?;
    if space.is_empty() {
        return Err(NmtError::config(format!(
            "tuning run '{}' has an empty search space",
            spec.run_id
        )));
    }

    match spec.strategy {
        SearchStrategy::Grid => {
            if spec.max_iters.is_some() || spec.seed.is_some() {
                warn!("seed and max_iters only apply to random search; ignoring");
            }
            let combinations = space.combinations();
            info!(run_id = %spec.run_id, combinations = combinations.len(), "Expanded grid search");
            Ok(Expansion {
                combinations,
                seed: None,
            })
        }
        SearchStrategy::Random => {
            let seed = spec.seed.unwrap_or_else(|| {
                let seed = rand::random();
                warn!(seed, "No seed given for random search; results will not repeat without it");
                seed
            });
            let combinations = sample(&space.combinations(), seed, spec.max_iters);
            info!(
                run_id = %spec.run_id,
                seed,
                space = space.len(),
                sampled = combinations.len(),
                "Sampled random search"
            );
            Ok(Expansion {
                combinations,
                seed: Some(seed),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(n: usize) -> Vec<ParameterSet> {
        (0..n)
            .map(|i| ParameterSet::from([("dim-emb".to_string(), vec![i.to_string()])]))
            .collect()
    }

    #[test]
    fn test_sample_is_reproducible() {
        let space = pool(50);
        let first = sample(&space, 42, Some(10));
        let second = sample(&space, 42, Some(10));
        assert_eq!(first.len(), 10);
        assert_eq!(first, second);
    }

    #[test]
    fn test_sample_without_replacement() {
        let space = pool(20);
        let drawn = sample(&space, 7, Some(20));
        let mut values: Vec<String> = drawn.iter().map(|s| s["dim-emb"][0].clone()).collect();
        values.sort();
        values.dedup();
        assert_eq!(values.len(), 20);
    }

    #[test]
    fn test_sample_cap_larger_than_space() {
        assert_eq!(sample(&pool(3), 1, Some(10)).len(), 3);
        assert_eq!(sample(&pool(3), 1, None).len(), 3);
        assert!(sample(&[], 1, Some(5)).is_empty());
    }

    #[test]
    fn test_strategy_aliases() {
        let spec: TuningSpec = serde_json::from_str(
            r#"{"run_id": "t", "strategy": "randomsearch", "seed": 42, "max_iters": 10}"#,
        )
        .unwrap();
        assert_eq!(spec.strategy, SearchStrategy::Random);
        let spec: TuningSpec = serde_json::from_str(r#"{"run_id": "t"}"#).unwrap();
        assert_eq!(spec.strategy, SearchStrategy::Grid);
    }
}
