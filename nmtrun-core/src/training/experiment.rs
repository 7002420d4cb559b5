//! Run registry: one record per configuration the pipeline executed.

use crate::command::config::Flags;
use crate::error::NmtError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    StoppedEarly,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::StoppedEarly => write!(f, "stopped early"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub run_id: Option<String>,
    pub model: String,
    pub flags: Flags,
    pub status: RunStatus,
    pub invocations: usize,
    pub validation_points: usize,
    pub last_epoch: Option<u32>,
    pub message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunRecord {
    pub fn start(run_id: Option<String>, model: &str, flags: &Flags) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            run_id,
            model: model.to_string(),
            flags: flags.clone(),
            status: RunStatus::Running,
            invocations: 0,
            validation_points: 0,
            last_epoch: None,
            message: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn finish(&mut self, status: RunStatus, message: Option<String>) {
        self.status = status;
        self.message = message;
        self.finished_at = Some(Utc::now());
    }
}

/// Registry of pipeline runs, persisted as JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunRegistry {
    pub runs: Vec<RunRecord>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self { runs: Vec::new() }
    }

    /// Load a registry; a missing file is an empty registry.
    pub fn load(path: &Path) -> Result<Self, NmtError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(NmtError::at(path, e)),
        }
    }

    /// Written to a `.json.tmp` sibling, then renamed over `path`.
    pub fn save(&self, path: &Path) -> Result<(), NmtError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| NmtError::at(parent, e))?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(self)?)
            .map_err(|e| NmtError::at(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| NmtError::at(path, e))
    }

    /// Insert or replace a record by id.
    pub fn upsert(&mut self, record: RunRecord) {
        match self.runs.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => self.runs.push(record),
        }
    }

    pub fn find(&self, id: &str) -> Option<&RunRecord> {
        self.runs.iter().find(|r| r.id == id)
    }

    pub fn list_by_status(&self, status: &RunStatus) -> Vec<&RunRecord> {
        self.runs.iter().filter(|r| &r.status == status).collect()
    }
}
