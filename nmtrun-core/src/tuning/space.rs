//! Search-space files.
//!
//! A grid file is a JSON object mapping a flag name to its candidate values
//! and expands to the cartesian product of its lists. A fixed-parameter file
//! maps each flag to a single value and contributes one combination.
//! Duplicate keys in a file resolve to the last occurrence.

use crate::command::config::{Flags, flag_values_from_json};
use crate::error::NmtError;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// One combination of flag values.
pub type ParameterSet = Flags;

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterGrid {
    pub source: PathBuf,
    /// Flag name → candidate values, each candidate a (possibly multi-valued)
    /// flag value list.
    pub axes: Vec<(String, Vec<Vec<String>>)>,
}

fn read_object(path: &Path) -> Result<Map<String, Value>, NmtError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        NmtError::config(format!("cannot read search-space file {}: {e}", path.display()))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        NmtError::config(format!(
            "search-space file {} is not a JSON object: {e}",
            path.display()
        ))
    })
}

impl ParameterGrid {
    pub fn from_object(source: impl Into<PathBuf>, object: &Map<String, Value>) -> Result<Self, NmtError> {
        let mut axes = Vec::with_capacity(object.len());
        for (name, value) in object {
            let candidates = match value {
                Value::Array(items) => items
                    .iter()
                    .map(|item| flag_values_from_json(name, item))
                    .collect::<Result<Vec<_>, _>>()?,
                scalar => vec![flag_values_from_json(name, scalar)?],
            };
            if candidates.is_empty() {
                return Err(NmtError::config(format!(
                    "grid parameter '{name}' has no candidate values"
                )));
            }
            axes.push((name.clone(), candidates));
        }
        Ok(Self {
            source: source.into(),
            axes,
        })
    }

    pub fn load(path: &Path) -> Result<Self, NmtError> {
        Self::from_object(path, &read_object(path)?)
    }

    /// Number of combinations this grid expands to.
    pub fn len(&self) -> usize {
        self.axes.iter().map(|(_, values)| values.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cartesian product of all axes; the first axis varies slowest.
    pub fn combinations(&self) -> Vec<ParameterSet> {
        let mut combinations = vec![ParameterSet::new()];
        for (name, candidates) in &self.axes {
            combinations = combinations
                .iter()
                .flat_map(|partial| {
                    candidates.iter().map(move |candidate| {
                        let mut next = partial.clone();
                        next.insert(name.clone(), candidate.clone());
                        next
                    })
                })
                .collect();
        }
        combinations
    }
}

/// Load a fixed-parameter file as a single combination.
pub fn load_fixed(path: &Path) -> Result<ParameterSet, NmtError> {
    read_object(path)?
        .iter()
        .map(|(name, value)| Ok::<_, NmtError>((name.clone(), flag_values_from_json(name, value)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn grid(value: Value) -> ParameterGrid {
        let Value::Object(object) = value else {
            panic!("expected object");
        };
        ParameterGrid::from_object("grid.json", &object).unwrap()
    }

    #[test]
    fn test_two_by_two_grid() {
        let grid = grid(json!({"a": ["x", "y"], "b": ["p", "q"]}));
        assert_eq!(grid.len(), 4);
        let combos = grid.combinations();
        let pairs: Vec<(String, String)> = combos
            .iter()
            .map(|c| (c["a"][0].clone(), c["b"][0].clone()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("x".into(), "p".into()),
                ("x".into(), "q".into()),
                ("y".into(), "p".into()),
                ("y".into(), "q".into()),
            ]
        );
    }

    #[test]
    fn test_numeric_and_multi_valued_candidates() {
        let grid = grid(json!({"learn-rate": [0.0003, 0.0001], "valid-sets": [["a", "b"]]}));
        let combos = grid.combinations();
        assert_eq!(combos.len(), 2);
        assert_eq!(combos[0]["learn-rate"], vec!["0.0003"]);
        assert_eq!(combos[1]["valid-sets"], vec!["a", "b"]);
    }

    #[test]
    fn test_empty_candidates_rejected() {
        let Value::Object(object) = json!({"a": []}) else {
            unreachable!()
        };
        assert!(ParameterGrid::from_object("g.json", &object).is_err());
    }

    #[test]
    fn test_duplicate_keys_last_wins() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("grid2.json");
        std::fs::write(&path, r#"{"k21": ["v21"], "k21": ["v22"]}"#).unwrap();
        let grid = ParameterGrid::load(&path).unwrap();
        assert_eq!(grid.len(), 1);
        assert_eq!(grid.combinations()[0]["k21"], vec!["v22"]);
    }

    #[test]
    fn test_load_fixed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("params.json");
        std::fs::write(&path, r#"{"k31": "v31", "k32": 2}"#).unwrap();
        let set = load_fixed(&path).unwrap();
        assert_eq!(set["k31"], vec!["v31"]);
        assert_eq!(set["k32"], vec!["2"]);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = ParameterGrid::load(Path::new("/nonexistent/grid.json")).unwrap_err();
        assert!(matches!(err, NmtError::Config(_)));
    }
}
