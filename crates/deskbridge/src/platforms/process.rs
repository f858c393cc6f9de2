use crate::platforms::ProcessRunner;
use crate::{AutomationError, CommandOutput};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tracing::debug;

/// Runs shell commands through `sh -c` (or `cmd /C` on Windows).
pub struct ShellRunner;

impl ShellRunner {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new()
    }
}

fn shell_parts(command: &str) -> (&'static str, Vec<&str>) {
    if cfg!(windows) {
        ("cmd", vec!["/C", command])
    } else {
        ("sh", vec!["-c", command])
    }
}

fn check_cwd(cwd: Option<&Path>) -> Result<(), AutomationError> {
    if let Some(dir) = cwd {
        if !dir.is_dir() {
            return Err(AutomationError::NotFound(format!(
                "Directory not found: {}",
                dir.display()
            )));
        }
    }
    Ok(())
}

#[async_trait::async_trait]
impl ProcessRunner for ShellRunner {
    async fn run(
        &self,
        command: &str,
        cwd: Option<&Path>,
        timeout: Duration,
    ) -> Result<CommandOutput, AutomationError> {
        check_cwd(cwd)?;
        debug!(command, ?cwd, "run command");

        let (program, args) = shell_parts(command);
        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args).stdin(Stdio::null()).kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| AutomationError::Timeout(command.to_string()))?
            .map_err(|e| {
                AutomationError::ExternalFailure(format!("Failed to execute command: {e}"))
            })?;

        Ok(CommandOutput {
            exit_status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    fn spawn_detached(&self, command: &str, cwd: Option<&Path>) -> Result<u32, AutomationError> {
        check_cwd(cwd)?;
        debug!(command, ?cwd, "spawn detached");

        let (program, args) = shell_parts(command);
        let mut cmd = std::process::Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|e| {
            AutomationError::ExternalFailure(format!("Failed to spawn command: {e}"))
        })?;
        Ok(child.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_exit_status() {
        let runner = ShellRunner::new();
        let output = runner
            .run("echo hello", None, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(output.exit_status, Some(0));
        assert_eq!(output.stdout.trim(), "hello");
        assert!(output.stderr.is_empty());
    }

    #[tokio::test]
    async fn nonzero_exit_is_not_an_error() {
        let runner = ShellRunner::new();
        let output = runner
            .run("exit 3", None, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(output.exit_status, Some(3));
    }

    #[tokio::test]
    async fn missing_cwd_is_rejected() {
        let runner = ShellRunner::new();
        let err = runner
            .run("echo hi", Some(Path::new("/definitely/not/here")), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, AutomationError::NotFound(_)));
        assert!(err.to_string().contains("Directory not found"));
    }

    #[tokio::test]
    async fn slow_commands_time_out() {
        let runner = ShellRunner::new();
        let err = runner
            .run("sleep 5", None, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, AutomationError::Timeout(_)));
    }

    #[tokio::test]
    async fn detached_spawn_returns_a_pid() {
        let runner = ShellRunner::new();
        let pid = runner.spawn_detached("sleep 0.1", None).unwrap();
        assert!(pid > 0);
    }
}
