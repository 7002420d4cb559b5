//! Append-only CSV results store.

use crate::error::NmtError;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

pub const RESULT_COLUMNS: [&str; 7] = [
    "model_name",
    "metric",
    "score",
    "parameters",
    "timestamp",
    "duration",
    "epoch",
];

/// One score for one metric at one validation point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub model_name: String,
    pub metric: String,
    pub score: f64,
    /// JSON object of the flags the model was trained with.
    pub parameters: String,
    /// RFC 3339.
    pub timestamp: String,
    /// Seconds spent in the trainer for this validation point.
    pub duration: f64,
    pub epoch: Option<u32>,
}

/// Results file shared by every run of a command.
#[derive(Debug, Clone)]
pub struct ResultsStore {
    path: PathBuf,
}

impl ResultsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append rows, writing the header first if the file is new or empty.
    pub fn append(&self, rows: &[ResultRow]) -> Result<(), NmtError> {
        if rows.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| NmtError::at(parent, e))?;
            }
        }

        let needs_header = std::fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| NmtError::at(&self.path, e))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if needs_header {
            writer.write_record(RESULT_COLUMNS)?;
        }
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush().map_err(|e| NmtError::at(&self.path, e))?;
        Ok(())
    }

    /// Read every row; a missing file reads as empty.
    pub fn read_all(&self) -> Result<Vec<ResultRow>, NmtError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        reader
            .deserialize()
            .map(|row| row.map_err(NmtError::from))
            .collect()
    }
}
