//! Error types for the nmtrun-core crate.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for orchestration.
#[derive(Debug, Error)]
pub enum NmtError {
    /// Missing or malformed required flag, setting, or search-space file.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The external trainer invocation failed.
    #[error("Process error: command `{command}` failed: {message}")]
    Process { command: String, message: String },

    /// Missing output or reference artifact, or an unknown metric.
    #[error("Validation error: {0}")]
    Validation(String),

    /// No pretrained checkpoint qualifies for the requested target epoch.
    #[error("No cached checkpoint below epoch {target} matching {template}")]
    CheckpointSelection { template: String, target: u32 },

    #[error("IO error at {path}: {source}")]
    Path {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Results store error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Settings error: {0}")]
    Settings(#[from] Box<figment::Error>),
}

/// Result type alias for nmtrun-core.
pub type Result<T> = std::result::Result<T, NmtError>;

impl NmtError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn process(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Process {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Attach the offending path to an I/O error.
    pub fn at(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Path {
            path: path.into(),
            source,
        }
    }

    /// Whether this error aborts a combination before any rows are written.
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::CheckpointSelection { .. } | Self::Settings(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NmtError::process("marian --model m.npz", "exit status: 1");
        assert_eq!(
            err.to_string(),
            "Process error: command `marian --model m.npz` failed: exit status: 1"
        );

        let err = NmtError::CheckpointSelection {
            template: "cache/model_{}".into(),
            target: 12,
        };
        assert!(err.to_string().contains("below epoch 12"));
    }

    #[test]
    fn test_setup_errors() {
        assert!(NmtError::config("missing after-epochs").is_setup_error());
        assert!(!NmtError::validation("missing output").is_setup_error());
    }
}
