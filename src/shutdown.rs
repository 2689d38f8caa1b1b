/// The one-shot shutdown action fired once the quiet period has elapsed.
///
/// The command runs with inherited stdout/stderr and is awaited to completion.
/// Whatever happens, firing ends the poll loop: a failing command is reported
/// as [`Outcome::Fatal`] and never retried.
use crate::monitor::Outcome;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;

/// Argument vector of the external shutdown command. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownCommand {
    program: String,
    args: Vec<String>,
}

/// Errors from building or running the shutdown command.
#[derive(Debug)]
pub enum ShutdownError {
    /// The configured command line has no words.
    EmptyCommand,
    /// The command could not be started.
    Spawn {
        program: String,
        source: std::io::Error,
    },
    /// The command ran and exited unsuccessfully.
    Failed { program: String, status: ExitStatus },
}

impl std::fmt::Display for ShutdownError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownError::EmptyCommand => write!(f, "shutdown command is empty"),
            ShutdownError::Spawn { program, source } => {
                write!(f, "failed to start shutdown command {}: {}", program, source)
            }
            ShutdownError::Failed { program, status } => {
                write!(f, "shutdown command {} failed: {}", program, status)
            }
        }
    }
}

impl std::error::Error for ShutdownError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ShutdownError::Spawn { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl ShutdownCommand {
    /// Split a command line on whitespace.
    pub fn parse(command_line: &str) -> Result<Self, ShutdownError> {
        Self::from_argv(command_line.split_whitespace().map(str::to_string))
    }

    pub fn from_argv<I>(argv: I) -> Result<Self, ShutdownError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut argv = argv.into_iter();
        let program = argv.next().ok_or(ShutdownError::EmptyCommand)?;
        Ok(Self {
            program,
            args: argv.collect(),
        })
    }
}

impl std::fmt::Display for ShutdownCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Fire the shutdown action.
///
/// With `dry_run` the command is only logged. Returns [`Outcome::Triggered`]
/// on success (or dry run) and [`Outcome::Fatal`] when the command fails.
pub async fn trigger(command: &ShutdownCommand, dry_run: bool) -> Outcome {
    tracing::info!(command = %command, dry_run, "running shutdown command");
    if dry_run {
        tracing::info!("dry-run enabled, not shutting down");
        return Outcome::Triggered;
    }

    match execute(command).await {
        Ok(()) => Outcome::Triggered,
        Err(e) => {
            tracing::error!(error = %e, "shutdown action failed");
            Outcome::Fatal(e)
        }
    }
}

async fn execute(command: &ShutdownCommand) -> Result<(), ShutdownError> {
    let status = Command::new(&command.program)
        .args(&command.args)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(|e| ShutdownError::Spawn {
            program: command.program.clone(),
            source: e,
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(ShutdownError::Failed {
            program: command.program.clone(),
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_on_whitespace() {
        let cmd = ShutdownCommand::parse("  systemctl   poweroff --no-wall ").unwrap();
        assert_eq!(cmd.program, "systemctl");
        assert_eq!(cmd.args, ["poweroff", "--no-wall"]);
        assert_eq!(cmd.to_string(), "systemctl poweroff --no-wall");
    }

    #[test]
    fn test_parse_empty_is_error() {
        assert!(matches!(
            ShutdownCommand::parse("   "),
            Err(ShutdownError::EmptyCommand)
        ));
        assert!(matches!(
            ShutdownCommand::from_argv(Vec::new()),
            Err(ShutdownError::EmptyCommand)
        ));
    }

    #[tokio::test]
    async fn test_dry_run_never_executes() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran");
        let cmd = ShutdownCommand::from_argv(vec![
            "touch".to_string(),
            marker.display().to_string(),
        ])
        .unwrap();

        let outcome = trigger(&cmd, true).await;
        assert!(matches!(outcome, Outcome::Triggered));
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_dry_run_with_missing_binary_still_triggers() {
        let cmd = ShutdownCommand::parse("nonexistent-binary-xyz now").unwrap();
        assert!(matches!(trigger(&cmd, true).await, Outcome::Triggered));
    }

    #[tokio::test]
    async fn test_successful_command_triggers() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran");
        let cmd = ShutdownCommand::from_argv(vec![
            "touch".to_string(),
            marker.display().to_string(),
        ])
        .unwrap();

        assert!(matches!(trigger(&cmd, false).await, Outcome::Triggered));
        assert!(marker.exists());
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_fatal() {
        let cmd = ShutdownCommand::from_argv(vec![
            "sh".to_string(),
            "-c".to_string(),
            "exit 42".to_string(),
        ])
        .unwrap();

        match trigger(&cmd, false).await {
            Outcome::Fatal(ShutdownError::Failed { status, .. }) => {
                assert_eq!(status.code(), Some(42));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_spawn_failure_is_fatal() {
        let cmd = ShutdownCommand::parse("nonexistent-binary-xyz").unwrap();
        match trigger(&cmd, false).await {
            Outcome::Fatal(err) => {
                assert!(matches!(err, ShutdownError::Spawn { .. }));
                assert!(err.to_string().contains("failed to start"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
