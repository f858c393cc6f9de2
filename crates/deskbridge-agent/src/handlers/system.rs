//! Shell execution, terminal windows, and agent introspection.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use deskbridge::{AutomationError, MAX_WIDTH};

use super::{parse_args, BridgeContext};

const DEFAULT_RUN_TIMEOUT_SECS: f64 = 30.0;

/// Command timeout from the wire. Nonpositive or non-finite values fall
/// back to the default rather than panicking in `from_secs_f64`.
fn run_timeout(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f64(secs.min(3600.0))
    } else {
        Duration::from_secs_f64(DEFAULT_RUN_TIMEOUT_SECS)
    }
}

fn default_timeout() -> f64 {
    DEFAULT_RUN_TIMEOUT_SECS
}

#[derive(Debug, Deserialize)]
struct RunArgs {
    #[serde(default)]
    command: String,
    #[serde(default)]
    cwd: Option<String>,
    #[serde(default = "default_timeout")]
    timeout: f64,
    #[serde(default)]
    background: bool,
}

pub(super) async fn run(ctx: Arc<BridgeContext>, params: Value) -> Result<Value, AutomationError> {
    let args: RunArgs = parse_args(params)?;
    let cwd = args.cwd.as_deref().map(Path::new);
    let cwd_shown = args.cwd.clone().unwrap_or_else(|| {
        std::env::current_dir()
            .map(|dir| dir.display().to_string())
            .unwrap_or_default()
    });

    if args.background {
        let pid = ctx.desktop().spawn_detached(&args.command, cwd)?;
        return Ok(json!({
            "status": "success",
            "command": args.command,
            "cwd": cwd_shown,
            "pid": pid,
            "background": true,
        }));
    }

    match ctx
        .desktop()
        .run_command(&args.command, cwd, run_timeout(args.timeout))
        .await
    {
        Ok(output) => Ok(json!({
            "status": "success",
            "command": args.command,
            "cwd": cwd_shown,
            "returncode": output.exit_status,
            "stdout": output.stdout,
            "stderr": output.stderr,
        })),
        Err(AutomationError::Timeout(_)) => Ok(json!({
            "status": "error",
            "message": "Command timed out",
        })),
        Err(other) => Err(other),
    }
}

#[derive(Debug, Deserialize)]
struct TerminalArgs {
    #[serde(default)]
    command: String,
    #[serde(default)]
    cwd: String,
}

#[cfg(target_os = "macos")]
fn escape_applescript(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(target_os = "linux")]
fn spawn_terminal(command: &str) -> Result<u32, AutomationError> {
    use std::process::Stdio;

    let child = std::process::Command::new("x-terminal-emulator")
        .args(["-e", "sh", "-c", command])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| AutomationError::ExternalFailure(format!("Failed to open terminal: {e}")))?;
    Ok(child.id())
}

/// Run a command in a visible terminal window. On macOS the output is
/// captured through Terminal.app; on Linux the terminal is detached and
/// only the pid comes back.
pub(super) async fn terminal_run(
    _ctx: Arc<BridgeContext>,
    params: Value,
) -> Result<Value, AutomationError> {
    let args: TerminalArgs = parse_args(params)?;
    if args.command.is_empty() {
        return Err(AutomationError::InvalidInput("command required".to_string()));
    }

    #[cfg(target_os = "macos")]
    {
        let full = if args.cwd.is_empty() {
            args.command.clone()
        } else {
            format!("cd {} && {}", args.cwd, args.command)
        };
        let script = format!(
            "tell application \"Terminal\" to do script \"{}\"",
            escape_applescript(&full)
        );
        let mut cmd = tokio::process::Command::new("osascript");
        cmd.args(["-e", &script])
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true);
        let output = match tokio::time::timeout(Duration::from_secs(10), cmd.output()).await {
            Ok(done) => done.map_err(|e| {
                AutomationError::ExternalFailure(format!("Failed to run osascript: {e}"))
            })?,
            Err(_) => {
                return Ok(json!({"status": "error", "message": "Command timed out"}));
            }
        };
        let status = if output.status.success() {
            "success"
        } else {
            "error"
        };
        Ok(json!({
            "status": status,
            "action": "terminal_run",
            "command": args.command,
            "cwd": args.cwd,
            "stdout": String::from_utf8_lossy(&output.stdout).trim().to_string(),
            "stderr": String::from_utf8_lossy(&output.stderr).to_string(),
        }))
    }

    #[cfg(target_os = "linux")]
    {
        let full = if args.cwd.is_empty() {
            args.command.clone()
        } else {
            format!("cd {} && {}", args.cwd, args.command)
        };
        let pid = spawn_terminal(&full)?;
        Ok(json!({
            "status": "success",
            "action": "terminal_run",
            "command": args.command,
            "cwd": args.cwd,
            "pid": pid,
        }))
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        Err(AutomationError::Unsupported(format!(
            "terminal_run not supported on {}",
            std::env::consts::OS
        )))
    }
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Physical screen size plus the downsizing a capture would apply.
pub(super) async fn screen(
    ctx: Arc<BridgeContext>,
    _params: Value,
) -> Result<Value, AutomationError> {
    let (width, height) = ctx.desktop().screen_size()?;
    Ok(json!({
        "status": "success",
        "width": width,
        "height": height,
        "platform": std::env::consts::OS,
        "screenshot_width": MAX_WIDTH,
        "scale_ratio": round3(width as f64 / MAX_WIDTH as f64),
    }))
}

pub(super) async fn status(
    ctx: Arc<BridgeContext>,
    _params: Value,
) -> Result<Value, AutomationError> {
    let mut result = json!({
        "status": "running",
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "platform": std::env::consts::OS,
        "backend": ctx.desktop().backend_name(),
        "session": ctx.session(),
        "reference_taken": ctx.capture().reference_taken(),
        "scale_ratio": ctx.capture().scale_ratio(),
        "uptime_secs": ctx.uptime_secs(),
    });
    if let Some(hash) = option_env!("GIT_HASH") {
        result["git_hash"] = json!(hash);
    }
    if let Some(stamp) = option_env!("BUILD_TIMESTAMP") {
        result["built_at"] = json!(stamp);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::super::testutil;
    use serde_json::json;

    #[tokio::test]
    async fn run_captures_output_and_exit_status() {
        let bridge = testutil::bridge();
        let result = super::run(bridge.ctx.clone(), json!({"command": "echo bridge"}))
            .await
            .unwrap();

        assert_eq!(result["status"], "success");
        assert_eq!(result["returncode"], json!(0));
        assert_eq!(result["stdout"].as_str().unwrap().trim(), "bridge");
        assert!(!result["cwd"].as_str().unwrap().is_empty());
        assert!(result.get("action").is_none());
    }

    #[tokio::test]
    async fn nonzero_exits_still_report_success() {
        let bridge = testutil::bridge();
        let result = super::run(bridge.ctx.clone(), json!({"command": "exit 3"}))
            .await
            .unwrap();
        assert_eq!(result["status"], "success");
        assert_eq!(result["returncode"], json!(3));
    }

    #[tokio::test]
    async fn a_missing_working_directory_is_not_found() {
        let bridge = testutil::bridge();
        let err = super::run(
            bridge.ctx.clone(),
            json!({"command": "echo hi", "cwd": "/definitely/not/here"}),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Directory not found"));
    }

    #[tokio::test]
    async fn timeouts_come_back_as_an_error_payload() {
        let bridge = testutil::bridge();
        let result = super::run(
            bridge.ctx.clone(),
            json!({"command": "sleep 5", "timeout": 0.05}),
        )
        .await
        .unwrap();
        assert_eq!(result["status"], "error");
        assert_eq!(result["message"], "Command timed out");
    }

    #[tokio::test]
    async fn background_commands_report_a_pid() {
        let bridge = testutil::bridge();
        let result = super::run(
            bridge.ctx.clone(),
            json!({"command": "true", "background": true}),
        )
        .await
        .unwrap();
        assert_eq!(result["background"], json!(true));
        assert!(result["pid"].is_u64());
    }

    #[tokio::test]
    async fn screen_reports_the_downsizing_ratio() {
        let bridge = testutil::bridge();
        let result = super::screen(bridge.ctx.clone(), json!({})).await.unwrap();
        assert_eq!(result["width"], json!(1280));
        assert_eq!(result["height"], json!(800));
        assert_eq!(result["screenshot_width"], json!(1000));
        assert_eq!(result["scale_ratio"], json!(1.28));
    }

    #[tokio::test]
    async fn status_reports_the_running_session() {
        let bridge = testutil::bridge();
        let result = super::status(bridge.ctx.clone(), json!({})).await.unwrap();

        assert_eq!(result["status"], "running");
        assert_eq!(result["name"], env!("CARGO_PKG_NAME"));
        assert_eq!(result["backend"], "stub");
        assert_eq!(result["session"], bridge.ctx.session());
        assert_eq!(result["reference_taken"], json!(false));
        assert!(result["uptime_secs"].is_u64());
    }
}
