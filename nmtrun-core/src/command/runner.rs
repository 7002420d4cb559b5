//! Trainer process execution.
//!
//! Invocations are awaited one at a time; the training engine never starts a
//! second trainer before the previous one has exited.

use crate::error::NmtError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Executes a command line to completion.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `command`. A non-zero exit or a spawn failure is an error.
    async fn run(&self, command: &str) -> Result<(), NmtError>;
}

/// Runs command lines through `sh -c`, streaming trainer output to the
/// parent's stdout/stderr.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: PathBuf,
    working_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellRunner {
    pub fn new() -> Self {
        Self {
            shell: PathBuf::from("sh"),
            working_dir: None,
            timeout: None,
        }
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ProcessRunner for ShellRunner {
    async fn run(&self, command: &str) -> Result<(), NmtError> {
        debug!(command, "Running trainer command");

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| NmtError::process(command, format!("failed to spawn: {e}")))?;

        let status = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    let _ = child.kill().await;
                    return Err(NmtError::process(
                        command,
                        format!("timed out after {}s", limit.as_secs()),
                    ));
                }
            },
            None => child.wait().await,
        }
        .map_err(|e| NmtError::process(command, format!("failed to wait: {e}")))?;

        if !status.success() {
            warn!(command, %status, "Trainer exited with non-zero status");
            return Err(NmtError::process(command, status.to_string()));
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shell_runner_success() {
        let runner = ShellRunner::new();
        runner.run("true").await.unwrap();
    }

    #[tokio::test]
    async fn test_shell_runner_failure_is_process_error() {
        let runner = ShellRunner::new();
        let err = runner.run("exit 3").await.unwrap_err();
        assert!(matches!(err, NmtError::Process { .. }));
    }

    #[test]
    fn test_shell_runner_timeout() {
        let runner = ShellRunner::new().with_timeout(Some(Duration::from_millis(100)));
        let err = tokio_test::block_on(async {
            tokio::time::timeout(Duration::from_secs(5), runner.run("sleep 3"))
                .await
                .unwrap()
        })
        .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
