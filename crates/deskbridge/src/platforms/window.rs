use crate::platforms::WindowManager;
use crate::{AutomationError, WindowBounds};
use tracing::debug;

/// Window management backed by xcap enumeration for reads and `osascript`
/// (macOS) or `wmctrl` (Linux) for placement. Other platforms report
/// `Unsupported` for placement operations.
pub struct ScriptWindowManager;

impl ScriptWindowManager {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ScriptWindowManager {
    fn default() -> Self {
        Self::new()
    }
}

struct WindowInfo {
    app: String,
    title: String,
    bounds: WindowBounds,
    focused: bool,
}

fn enumerate() -> Result<Vec<WindowInfo>, AutomationError> {
    let windows = xcap::Window::all()
        .map_err(|e| AutomationError::ExternalFailure(format!("Failed to list windows: {e}")))?;

    let mut found = Vec::new();
    for window in windows {
        if window.is_minimized().unwrap_or(false) {
            continue;
        }
        let app = window.app_name().unwrap_or_default();
        let title = window.title().unwrap_or_default();
        if app.is_empty() && title.is_empty() {
            continue;
        }
        let bounds = WindowBounds {
            x: window.x().unwrap_or(0),
            y: window.y().unwrap_or(0),
            width: window.width().unwrap_or(0) as i32,
            height: window.height().unwrap_or(0) as i32,
        };
        found.push(WindowInfo {
            app,
            title,
            bounds,
            focused: window.is_focused().unwrap_or(false),
        });
    }
    Ok(found)
}

fn find_window(app: &str) -> Result<WindowInfo, AutomationError> {
    let needle = app.to_lowercase();
    enumerate()?
        .into_iter()
        .find(|w| {
            w.app.to_lowercase().contains(&needle) || w.title.to_lowercase().contains(&needle)
        })
        .ok_or_else(|| AutomationError::NotFound(format!("Window not found: {app}")))
}

async fn run_osascript(script: &str) -> Result<String, AutomationError> {
    let output = tokio::process::Command::new("osascript")
        .args(["-e", script])
        .output()
        .await
        .map_err(|e| AutomationError::ExternalFailure(format!("Failed to run osascript: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AutomationError::ExternalFailure(format!(
            "osascript failed: {}",
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

async fn run_wmctrl(args: &[&str]) -> Result<(), AutomationError> {
    let output = tokio::process::Command::new("wmctrl")
        .args(args)
        .output()
        .await
        .map_err(|e| AutomationError::ExternalFailure(format!("Failed to run wmctrl: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AutomationError::ExternalFailure(format!(
            "wmctrl failed: {}",
            stderr.trim()
        )));
    }
    Ok(())
}

fn escape_applescript(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[async_trait::async_trait]
impl WindowManager for ScriptWindowManager {
    async fn position(&self, app: &str) -> Result<WindowBounds, AutomationError> {
        Ok(find_window(app)?.bounds)
    }

    async fn move_window(&self, app: &str, x: i32, y: i32) -> Result<(), AutomationError> {
        debug!(app, x, y, "move window");
        match std::env::consts::OS {
            "macos" => {
                let app = escape_applescript(app);
                let script = format!(
                    "tell application \"System Events\" to tell process \"{app}\" to \
                     set position of window 1 to {{{x}, {y}}}"
                );
                run_osascript(&script).await.map(|_| ())
            }
            "linux" => {
                let geometry = format!("0,{x},{y},-1,-1");
                run_wmctrl(&["-r", app, "-e", &geometry]).await
            }
            os => Err(AutomationError::Unsupported(format!(
                "window placement on {os}"
            ))),
        }
    }

    async fn resize_window(&self, app: &str, width: u32, height: u32) -> Result<(), AutomationError> {
        debug!(app, width, height, "resize window");
        match std::env::consts::OS {
            "macos" => {
                let app = escape_applescript(app);
                let script = format!(
                    "tell application \"System Events\" to tell process \"{app}\" to \
                     set size of window 1 to {{{width}, {height}}}"
                );
                run_osascript(&script).await.map(|_| ())
            }
            "linux" => {
                let geometry = format!("0,-1,-1,{width},{height}");
                run_wmctrl(&["-r", app, "-e", &geometry]).await
            }
            os => Err(AutomationError::Unsupported(format!(
                "window placement on {os}"
            ))),
        }
    }

    async fn list(&self) -> Result<Vec<String>, AutomationError> {
        let mut names = Vec::new();
        for info in enumerate()? {
            let name = if info.app.is_empty() { info.title } else { info.app };
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Ok(names)
    }

    async fn foreground_bounds(&self) -> Result<WindowBounds, AutomationError> {
        enumerate()?
            .into_iter()
            .find(|w| w.focused)
            .map(|w| w.bounds)
            .ok_or_else(|| AutomationError::NotFound("No focused window".to_string()))
    }

    async fn activate(&self, app: &str) -> Result<(), AutomationError> {
        match std::env::consts::OS {
            "macos" => {
                let app = escape_applescript(app);
                let script = format!("tell application \"{app}\" to activate");
                run_osascript(&script).await.map(|_| ())
            }
            "linux" => run_wmctrl(&["-a", app]).await,
            os => Err(AutomationError::Unsupported(format!(
                "window activation on {os}"
            ))),
        }
    }
}
