//! Pretrained checkpoint cache.
//!
//! Pretrained models are cached in directories named by a template whose
//! final path component holds a `{}` placeholder for the epoch count, e.g.
//! `cache/pretrained_{}` → `cache/pretrained_10`.

use crate::error::NmtError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const PLACEHOLDER: &str = "{}";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachedCheckpoint {
    pub epoch: u32,
    pub dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CheckpointCache {
    template: String,
    parent: PathBuf,
    prefix: String,
    suffix: String,
}

impl CheckpointCache {
    pub fn new(template: impl Into<String>) -> Result<Self, NmtError> {
        let template = template.into();
        let path = Path::new(&template);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Some((prefix, suffix)) = name.split_once(PLACEHOLDER) else {
            return Err(NmtError::config(format!(
                "cache template '{template}' needs a '{{}}' placeholder in its last component"
            )));
        };
        if suffix.contains(PLACEHOLDER) || template.matches(PLACEHOLDER).count() != 1 {
            return Err(NmtError::config(format!(
                "cache template '{template}' must contain exactly one '{{}}'"
            )));
        }
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok(Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
            parent,
            template,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn dir_for(&self, epoch: u32) -> PathBuf {
        PathBuf::from(self.template.replacen(PLACEHOLDER, &epoch.to_string(), 1))
    }

    /// Directory `name` next to the ones the template renders.
    fn sibling(&self, name: &std::ffi::OsStr) -> PathBuf {
        match Path::new(&self.template).parent() {
            Some(p) if !p.as_os_str().is_empty() => p.join(name),
            _ => PathBuf::from(name),
        }
    }

    /// Epoch count embedded in a directory name, if it matches the template.
    pub fn parse_epoch(&self, name: &str) -> Option<u32> {
        let digits = name.strip_prefix(&self.prefix)?.strip_suffix(&self.suffix)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// Cached checkpoints sorted by epoch.
    pub fn list(&self) -> Result<Vec<CachedCheckpoint>, NmtError> {
        if !self.parent.is_dir() {
            return Ok(Vec::new());
        }
        let mut found = Vec::new();
        for entry in std::fs::read_dir(&self.parent).map_err(|e| NmtError::at(&self.parent, e))? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            if let Some(epoch) = self.parse_epoch(&name.to_string_lossy()) {
                found.push(CachedCheckpoint {
                    epoch,
                    dir: self.sibling(&name),
                });
            }
        }
        found.sort_by_key(|c| c.epoch);
        Ok(found)
    }

    /// Largest cached epoch strictly below `target`.
    pub fn select(&self, target: u32) -> Result<CachedCheckpoint, NmtError> {
        let selected = self
            .list()?
            .into_iter()
            .filter(|c| c.epoch < target)
            .max_by_key(|c| c.epoch)
            .ok_or_else(|| NmtError::CheckpointSelection {
                template: self.template.clone(),
                target,
            })?;
        info!(epoch = selected.epoch, target, dir = %selected.dir.display(), "Selected pretrained checkpoint");
        Ok(selected)
    }

    /// Copy the checkpoint's weight artifacts (files named after the model
    /// file, e.g. `model.npz` and `model.npz.optimizer.npz`) next to `model`.
    pub fn restore_into(
        &self,
        checkpoint: &CachedCheckpoint,
        model: &Path,
    ) -> Result<Vec<PathBuf>, NmtError> {
        let target_dir = model_dir(model);
        std::fs::create_dir_all(&target_dir).map_err(|e| NmtError::at(&target_dir, e))?;
        let copied = copy_artifacts(&checkpoint.dir, &target_dir, model)?;
        if copied.is_empty() {
            warn!(dir = %checkpoint.dir.display(), "Cached checkpoint holds no model artifacts; training starts from scratch");
        }
        Ok(copied)
    }

    /// Cache the artifacts next to `model` under the directory for `epoch`.
    pub fn store(&self, model: &Path, epoch: u32) -> Result<PathBuf, NmtError> {
        let dir = self.dir_for(epoch);
        std::fs::create_dir_all(&dir).map_err(|e| NmtError::at(&dir, e))?;
        let copied = copy_artifacts(&model_dir(model), &dir, model)?;
        info!(epoch, files = copied.len(), dir = %dir.display(), "Cached pretrained model");
        Ok(dir)
    }
}

fn model_dir(model: &Path) -> PathBuf {
    match model.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn copy_artifacts(from: &Path, to: &Path, model: &Path) -> Result<Vec<PathBuf>, NmtError> {
    let Some(model_name) = model.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return Err(NmtError::config(format!(
            "model path '{}' has no file name",
            model.display()
        )));
    };
    let mut copied = Vec::new();
    for entry in std::fs::read_dir(from).map_err(|e| NmtError::at(from, e))? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !entry.file_type()?.is_file() || !name.starts_with(&model_name) {
            continue;
        }
        let target = to.join(&name);
        std::fs::copy(entry.path(), &target).map_err(|e| NmtError::at(entry.path(), e))?;
        debug!(from = %entry.path().display(), to = %target.display(), "Copied model artifact");
        copied.push(target);
    }
    copied.sort();
    Ok(copied)
}
