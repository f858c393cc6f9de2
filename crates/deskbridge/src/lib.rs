//! Desktop and browser capabilities for the deskbridge agent
//!
//! This crate bundles the platform-facing half of the bridge: screen capture
//! with screenshot-to-screen coordinate normalization, input injection,
//! window management, accessibility lookups, shell execution, clipboard
//! access and a CDP browser driver. Every capability sits behind a trait so
//! the agent (and its tests) can run against stubs instead of a live
//! desktop.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

pub mod browser;
pub mod capture;
pub mod errors;
pub mod platforms;

pub use browser::{
    BrowserDriver, BrowserLauncher, CdpLauncher, ScrollDirection, ScrollRequest, Selector,
    WebElement,
};
pub use capture::{CaptureInfo, CaptureKind, CaptureService, ScreenScale, JPEG_QUALITY, MAX_WIDTH};
pub use errors::AutomationError;
pub use platforms::{
    create_backends, AccessibilityProvider, Capturer, ClipboardAccess, DesktopBackends,
    InputInjector, ProcessRunner, WindowManager,
};

/// Mouse button selector for click and drag operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    pub fn as_str(&self) -> &'static str {
        match self {
            MouseButton::Left => "left",
            MouseButton::Right => "right",
            MouseButton::Middle => "middle",
        }
    }
}

impl FromStr for MouseButton {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "left" => Ok(MouseButton::Left),
            "right" => Ok(MouseButton::Right),
            "middle" => Ok(MouseButton::Middle),
            other => Err(AutomationError::InvalidInput(format!(
                "Unknown mouse button: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub w: i32,
    pub h: i32,
}

/// Screen-space bounding box of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowBounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// An actionable element reported by the accessibility provider.
#[derive(Debug, Clone, Serialize)]
pub struct UiElement {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub position: Point,
    pub size: Size,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl UiElement {
    /// Click target for the element.
    pub fn center(&self) -> Point {
        Point {
            x: self.position.x + self.size.w / 2,
            y: self.position.y + self.size.h / 2,
        }
    }
}

/// Holds the output of a shell command execution.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// The key chord that pastes from the clipboard on the current OS.
pub fn paste_chord() -> [String; 2] {
    let modifier = if std::env::consts::OS == "macos" {
        "cmd"
    } else {
        "ctrl"
    };
    [modifier.to_string(), "v".to_string()]
}

/// Entry point for desktop automation: one concrete backend per capability,
/// selected at startup and shared behind `Arc`s.
///
/// # Examples
///
/// ```no_run
/// use deskbridge::Desktop;
/// let desktop = Desktop::new(false)?;
/// # Ok::<(), deskbridge::AutomationError>(())
/// ```
#[derive(Clone)]
pub struct Desktop {
    backends: DesktopBackends,
    backend_name: &'static str,
}

impl Desktop {
    /// Build a desktop over the native backends, or the stub set when
    /// `force_stub` is true (headless boxes, tests, CI).
    #[instrument]
    pub fn new(force_stub: bool) -> Result<Self, AutomationError> {
        let backends = platforms::create_backends(force_stub)?;
        Ok(Self {
            backends,
            backend_name: if force_stub { "stub" } else { "native" },
        })
    }

    /// Assemble a desktop from explicit backends. Used by tests to mix stubs
    /// with recording fakes.
    pub fn with_backends(backends: DesktopBackends, backend_name: &'static str) -> Self {
        Self {
            backends,
            backend_name,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    pub fn capturer(&self) -> Arc<dyn Capturer> {
        self.backends.capturer.clone()
    }

    pub fn window_manager(&self) -> Arc<dyn WindowManager> {
        self.backends.windows.clone()
    }

    pub fn screen_size(&self) -> Result<(u32, u32), AutomationError> {
        self.backends.capturer.screen_size()
    }

    #[instrument(skip(self))]
    pub async fn move_pointer(
        &self,
        x: i32,
        y: i32,
        duration: Duration,
    ) -> Result<(), AutomationError> {
        self.backends.input.move_to(x, y, duration).await
    }

    #[instrument(skip(self))]
    pub async fn click_at(
        &self,
        x: i32,
        y: i32,
        button: MouseButton,
        clicks: u32,
    ) -> Result<(), AutomationError> {
        self.backends.input.click(x, y, button, clicks).await
    }

    #[instrument(skip(self))]
    pub async fn drag(
        &self,
        from: (i32, i32),
        to: (i32, i32),
        duration: Duration,
        button: MouseButton,
    ) -> Result<(), AutomationError> {
        self.backends.input.drag(from, to, duration, button).await
    }

    #[instrument(skip(self))]
    pub async fn scroll(&self, amount: i32, at: Option<(i32, i32)>) -> Result<(), AutomationError> {
        self.backends.input.scroll(amount, at).await
    }

    #[instrument(skip(self))]
    pub async fn press_key(&self, key: &str) -> Result<(), AutomationError> {
        self.backends.input.press(key).await
    }

    #[instrument(skip(self))]
    pub async fn hotkey(&self, keys: &[String]) -> Result<(), AutomationError> {
        self.backends.input.hotkey(keys).await
    }

    /// Type text character by character. ASCII-safe but slow; prefer
    /// [`Desktop::type_with_clipboard`] for arbitrary Unicode.
    #[instrument(skip(self, text))]
    pub async fn write_text(&self, text: &str, interval: Duration) -> Result<(), AutomationError> {
        self.backends.input.write(text, interval).await
    }

    /// Put `text` on the clipboard and paste it into the focused control.
    /// Survives any Unicode the target application accepts.
    #[instrument(skip(self, text))]
    pub async fn type_with_clipboard(&self, text: &str) -> Result<(), AutomationError> {
        self.backends.clipboard.copy(text)?;
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.backends.input.hotkey(&paste_chord()).await?;
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(())
    }

    pub async fn pointer_position(&self) -> Result<(i32, i32), AutomationError> {
        self.backends.input.position().await
    }

    #[instrument(skip(self))]
    pub async fn run_command(
        &self,
        command: &str,
        cwd: Option<&Path>,
        timeout: Duration,
    ) -> Result<CommandOutput, AutomationError> {
        self.backends.process.run(command, cwd, timeout).await
    }

    #[instrument(skip(self))]
    pub fn spawn_detached(
        &self,
        command: &str,
        cwd: Option<&Path>,
    ) -> Result<u32, AutomationError> {
        self.backends.process.spawn_detached(command, cwd)
    }

    #[instrument(skip(self))]
    pub async fn window_position(&self, app: &str) -> Result<WindowBounds, AutomationError> {
        self.backends.windows.position(app).await
    }

    #[instrument(skip(self))]
    pub async fn move_window(&self, app: &str, x: i32, y: i32) -> Result<(), AutomationError> {
        self.backends.windows.move_window(app, x, y).await
    }

    #[instrument(skip(self))]
    pub async fn resize_window(
        &self,
        app: &str,
        width: u32,
        height: u32,
    ) -> Result<(), AutomationError> {
        self.backends.windows.resize_window(app, width, height).await
    }

    pub async fn list_windows(&self) -> Result<Vec<String>, AutomationError> {
        self.backends.windows.list().await
    }

    #[instrument(skip(self))]
    pub async fn activate_app(&self, app: &str) -> Result<(), AutomationError> {
        self.backends.windows.activate(app).await
    }

    #[instrument(skip(self))]
    pub async fn ui_elements(&self, app: &str) -> Result<Vec<UiElement>, AutomationError> {
        self.backends.accessibility.elements(app).await
    }
}
