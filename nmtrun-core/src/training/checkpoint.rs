//! Checkpoint file management: epoch-suffixed copies and trainer file cleanup.

use crate::error::NmtError;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Insert `-<epoch>` before the final extension of the model file name.
///
/// `model.npz` at epoch 10 becomes `model-10.npz`; `a.b.ext` at 5 becomes
/// `a.b-5.ext`. A name without an extension gets the suffix appended.
pub fn rename_checkpoint(model: impl AsRef<Path>, epoch: u32) -> PathBuf {
    let model = model.as_ref();
    let Some(name) = model.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return model.to_path_buf();
    };
    let renamed = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}-{epoch}.{ext}"),
        _ => format!("{name}-{epoch}"),
    };
    model.with_file_name(renamed)
}

/// Copy the model file to its epoch-suffixed name.
pub fn save_checkpoint_copy(model: &Path, epoch: u32) -> Result<PathBuf, NmtError> {
    let target = rename_checkpoint(model, epoch);
    std::fs::copy(model, &target).map_err(|e| NmtError::at(model, e))?;
    debug!(checkpoint = %target.display(), "Saved epoch checkpoint");
    Ok(target)
}

/// Whether `name` is the working model file or a file the trainer writes
/// next to it under the model's name (`model.npz.optimizer.npz`,
/// `model.npz.progress.yml`, ...). Epoch checkpoints never match.
fn is_trainer_file(model_name: &str, name: &str) -> bool {
    name == model_name
        || name
            .strip_prefix(model_name)
            .is_some_and(|rest| rest.starts_with('.'))
}

/// Directory holding `model`; a bare file name lives in the current directory.
fn model_dir(model: &Path) -> &Path {
    match model.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

/// Remove the working model file and the trainer's side files for it.
///
/// Epoch checkpoints and every file not named after the model are left
/// alone, so a model living in a shared directory never takes its
/// neighbours with it. Returns the number of removed files.
pub fn cleanup_model_dir(model: &Path) -> Result<usize, NmtError> {
    let Some(model_name) = model.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return Ok(0);
    };
    remove_trainer_files(model_dir(model), &model_name)
}

fn remove_trainer_files(dir: &Path, model_name: &str) -> Result<usize, NmtError> {
    if !dir.is_dir() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| NmtError::Io(e.into()))?;
        let name = entry.file_name().to_string_lossy();
        if !entry.file_type().is_file() || !is_trainer_file(model_name, &name) {
            continue;
        }
        std::fs::remove_file(entry.path()).map_err(|e| NmtError::at(entry.path(), e))?;
        removed += 1;
    }
    debug!(dir = %dir.display(), model = model_name, removed, "Removed trainer files");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rename_checkpoint() {
        assert_eq!(rename_checkpoint("model.npz", 10), PathBuf::from("model-10.npz"));
        assert_eq!(rename_checkpoint("a.b.ext", 5), PathBuf::from("a.b-5.ext"));
        assert_eq!(
            rename_checkpoint("runs/v1.2/model.npz", 15),
            PathBuf::from("runs/v1.2/model-15.npz")
        );
        assert_eq!(rename_checkpoint("model", 3), PathBuf::from("model-3"));
    }

    #[test]
    fn test_save_checkpoint_copy() {
        let dir = TempDir::new().unwrap();
        let model = dir.path().join("model.npz");
        std::fs::write(&model, "weights").unwrap();
        let copy = save_checkpoint_copy(&model, 5).unwrap();
        assert_eq!(copy, dir.path().join("model-5.npz"));
        assert_eq!(std::fs::read_to_string(copy).unwrap(), "weights");
        assert!(model.exists());
    }

    #[test]
    fn test_cleanup_removes_only_trainer_files() {
        let dir = TempDir::new().unwrap();
        let model = dir.path().join("model.npz");
        for name in [
            "model.npz",
            "model-5.npz",
            "model-10.npz",
            "model.npz.optimizer.npz",
            "model.npz.progress.yml",
            "model-best.npz",
            "model.npzx",
            "train.log",
        ] {
            std::fs::write(dir.path().join(name), name).unwrap();
        }
        std::fs::create_dir(dir.path().join("subdir")).unwrap();

        let removed = cleanup_model_dir(&model).unwrap();
        assert_eq!(removed, 3);

        let mut left: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(
            left,
            vec!["model-10.npz", "model-5.npz", "model-best.npz", "model.npzx", "subdir", "train.log"]
        );
    }

    #[test]
    fn test_cleanup_of_bare_model_spares_working_directory() {
        assert_eq!(model_dir(Path::new("model.npz")), Path::new("."));
        assert_eq!(model_dir(Path::new("runs/model.npz")), Path::new("runs"));

        let dir = TempDir::new().unwrap();
        for name in ["run.toml", "grid1.json", "train.gn", "results.csv", "model.npz"] {
            std::fs::write(dir.path().join(name), name).unwrap();
        }

        let removed = remove_trainer_files(dir.path(), "model.npz").unwrap();
        assert_eq!(removed, 1);
        assert!(!dir.path().join("model.npz").exists());
        for name in ["run.toml", "grid1.json", "train.gn", "results.csv"] {
            assert!(dir.path().join(name).exists(), "{name} was removed");
        }
    }
}
