use crate::{AutomationError, CommandOutput, MouseButton, UiElement, WindowBounds};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub mod access;
pub mod clipboard;
pub mod input;
pub mod process;
pub mod screen;
pub mod stub;
pub mod window;

/// Synthesizes pointer and keyboard events. Coordinates are real screen
/// pixels; callers convert screenshot-relative points before reaching this
/// layer.
#[async_trait::async_trait]
pub trait InputInjector: Send + Sync {
    /// Move the pointer to an absolute position, animated over `duration`.
    async fn move_to(&self, x: i32, y: i32, duration: Duration) -> Result<(), AutomationError>;

    async fn click(
        &self,
        x: i32,
        y: i32,
        button: MouseButton,
        clicks: u32,
    ) -> Result<(), AutomationError>;

    async fn drag(
        &self,
        from: (i32, i32),
        to: (i32, i32),
        duration: Duration,
        button: MouseButton,
    ) -> Result<(), AutomationError>;

    /// Scroll by `amount` notches (negative scrolls down), optionally moving
    /// the pointer to `at` first.
    async fn scroll(&self, amount: i32, at: Option<(i32, i32)>) -> Result<(), AutomationError>;

    /// Press and release a single named key.
    async fn press(&self, key: &str) -> Result<(), AutomationError>;

    /// Hold every key in order, then release in reverse order.
    async fn hotkey(&self, keys: &[String]) -> Result<(), AutomationError>;

    /// Type text one character at a time with `interval` between characters.
    async fn write(&self, text: &str, interval: Duration) -> Result<(), AutomationError>;

    /// Current pointer position.
    async fn position(&self) -> Result<(i32, i32), AutomationError>;
}

/// Raw pixel source for the capture service.
pub trait Capturer: Send + Sync {
    /// One full frame of the primary display.
    fn frame(&self) -> Result<image::RgbaImage, AutomationError>;

    /// Logical screen size in pixels, as input coordinates see it.
    fn screen_size(&self) -> Result<(u32, u32), AutomationError>;
}

/// Window placement and enumeration, addressed by application name.
#[async_trait::async_trait]
pub trait WindowManager: Send + Sync {
    async fn position(&self, app: &str) -> Result<WindowBounds, AutomationError>;

    async fn move_window(&self, app: &str, x: i32, y: i32) -> Result<(), AutomationError>;

    async fn resize_window(&self, app: &str, width: u32, height: u32)
        -> Result<(), AutomationError>;

    /// Names of applications with at least one visible window.
    async fn list(&self) -> Result<Vec<String>, AutomationError>;

    /// Bounding box of the currently focused window.
    async fn foreground_bounds(&self) -> Result<WindowBounds, AutomationError>;

    /// Bring the named application to the foreground.
    async fn activate(&self, app: &str) -> Result<(), AutomationError>;
}

/// Enumerates actionable UI elements of an application's front window.
#[async_trait::async_trait]
pub trait AccessibilityProvider: Send + Sync {
    async fn elements(&self, app: &str) -> Result<Vec<UiElement>, AutomationError>;
}

/// Shell command execution.
#[async_trait::async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run to completion through the platform shell, killing the child when
    /// `timeout` expires.
    async fn run(
        &self,
        command: &str,
        cwd: Option<&Path>,
        timeout: Duration,
    ) -> Result<CommandOutput, AutomationError>;

    /// Spawn detached with discarded output and return the child pid.
    fn spawn_detached(&self, command: &str, cwd: Option<&Path>) -> Result<u32, AutomationError>;
}

/// Write access to the system clipboard.
pub trait ClipboardAccess: Send + Sync {
    fn copy(&self, text: &str) -> Result<(), AutomationError>;
}

/// One concrete backend per capability, bundled for [`crate::Desktop`].
#[derive(Clone)]
pub struct DesktopBackends {
    pub input: Arc<dyn InputInjector>,
    pub windows: Arc<dyn WindowManager>,
    pub capturer: Arc<dyn Capturer>,
    pub accessibility: Arc<dyn AccessibilityProvider>,
    pub process: Arc<dyn ProcessRunner>,
    pub clipboard: Arc<dyn ClipboardAccess>,
}

/// Select backends for the current environment. `force_stub` swaps in the
/// deterministic stub set, which needs no display server and records input
/// instead of injecting it.
pub fn create_backends(force_stub: bool) -> Result<DesktopBackends, AutomationError> {
    if force_stub {
        return Ok(stub::stub_backends());
    }

    Ok(DesktopBackends {
        input: Arc::new(input::EnigoInput::new()?),
        windows: Arc::new(window::ScriptWindowManager::new()),
        capturer: Arc::new(screen::XcapCapturer::new()),
        accessibility: Arc::new(access::ScriptAccessibility::new()),
        process: Arc::new(process::ShellRunner::new()),
        clipboard: Arc::new(clipboard::SystemClipboard::new()),
    })
}
