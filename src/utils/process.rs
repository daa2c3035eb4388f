//! Bounded subprocess execution

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::errors::ProcessError;

/// Captured result of a finished child process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when the child was terminated by a signal
    pub status_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `program` to completion, killing it if `timeout` elapses first.
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<ProcessOutput, ProcessError>;
}

/// Runs commands with `tokio::process`. Children are killed when the
/// returned future is dropped.
#[derive(Debug, Clone, Default)]
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<ProcessOutput, ProcessError> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Running {} with {} argument(s)", program, args.len());

        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| ProcessError::Timeout {
                program: program.to_string(),
                timeout,
            })?
            .map_err(|source| ProcessError::Spawn {
                program: program.to_string(),
                source,
            })?;

        Ok(ProcessOutput {
            status_code: output.status.code(),
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_stdout_and_exit_code() {
        let output = TokioProcessRunner
            .run(
                "sh",
                &["-c".to_string(), "echo hello; exit 3".to_string()],
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.status_code, Some(3));
        assert!(!output.success);
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let err = TokioProcessRunner
            .run(
                "sh",
                &["-c".to_string(), "sleep 5".to_string()],
                Duration::from_millis(100),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_missing_executable_is_spawn_error() {
        let err = TokioProcessRunner
            .run("definitely-not-installed-xyz", &[], Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }
}
