//! In-memory backends for tests and headless development. Input is
//! recorded instead of injected, windows live in a mutable table, and
//! frames are synthesized, so the full action surface can run without a
//! display server.

use crate::platforms::process::ShellRunner;
use crate::platforms::{
    AccessibilityProvider, Capturer, ClipboardAccess, DesktopBackends, InputInjector, WindowManager,
};
use crate::{AutomationError, MouseButton, Point, Size, UiElement, WindowBounds};
use image::{Rgba, RgbaImage};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// One recorded input operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    MoveTo { x: i32, y: i32 },
    Click { x: i32, y: i32, button: MouseButton, clicks: u32 },
    Drag { from: (i32, i32), to: (i32, i32), button: MouseButton },
    Scroll { amount: i32, at: Option<(i32, i32)> },
    Press { key: String },
    Hotkey { keys: Vec<String> },
    Write { text: String },
}

/// Records input events and tracks a virtual pointer.
#[derive(Default)]
pub struct StubInput {
    events: Mutex<Vec<InputEvent>>,
    pointer: Mutex<(i32, i32)>,
}

impl StubInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<InputEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, event: InputEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    fn set_pointer(&self, x: i32, y: i32) {
        *self.pointer.lock().unwrap_or_else(PoisonError::into_inner) = (x, y);
    }
}

#[async_trait::async_trait]
impl InputInjector for StubInput {
    async fn move_to(&self, x: i32, y: i32, _duration: Duration) -> Result<(), AutomationError> {
        self.set_pointer(x, y);
        self.record(InputEvent::MoveTo { x, y });
        Ok(())
    }

    async fn click(
        &self,
        x: i32,
        y: i32,
        button: MouseButton,
        clicks: u32,
    ) -> Result<(), AutomationError> {
        self.set_pointer(x, y);
        self.record(InputEvent::Click { x, y, button, clicks });
        Ok(())
    }

    async fn drag(
        &self,
        from: (i32, i32),
        to: (i32, i32),
        _duration: Duration,
        button: MouseButton,
    ) -> Result<(), AutomationError> {
        self.set_pointer(to.0, to.1);
        self.record(InputEvent::Drag { from, to, button });
        Ok(())
    }

    async fn scroll(&self, amount: i32, at: Option<(i32, i32)>) -> Result<(), AutomationError> {
        if let Some((x, y)) = at {
            self.set_pointer(x, y);
        }
        self.record(InputEvent::Scroll { amount, at });
        Ok(())
    }

    async fn press(&self, key: &str) -> Result<(), AutomationError> {
        self.record(InputEvent::Press { key: key.to_string() });
        Ok(())
    }

    async fn hotkey(&self, keys: &[String]) -> Result<(), AutomationError> {
        self.record(InputEvent::Hotkey { keys: keys.to_vec() });
        Ok(())
    }

    async fn write(&self, text: &str, _interval: Duration) -> Result<(), AutomationError> {
        self.record(InputEvent::Write { text: text.to_string() });
        Ok(())
    }

    async fn position(&self) -> Result<(i32, i32), AutomationError> {
        Ok(*self.pointer.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Produces synthetic gradient frames with configurable dimensions.
pub struct StubCapturer {
    frame: (u32, u32),
    screen: (u32, u32),
}

impl StubCapturer {
    pub fn new() -> Self {
        Self::with_dimensions((1280, 800), (1280, 800))
    }

    /// `frame` is the captured pixel size, `screen` the logical monitor
    /// size. They differ on HiDPI displays.
    pub fn with_dimensions(frame: (u32, u32), screen: (u32, u32)) -> Self {
        Self { frame, screen }
    }
}

impl Default for StubCapturer {
    fn default() -> Self {
        Self::new()
    }
}

impl Capturer for StubCapturer {
    fn frame(&self) -> Result<RgbaImage, AutomationError> {
        let (w, h) = self.frame;
        Ok(RgbaImage::from_fn(w, h, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
        }))
    }

    fn screen_size(&self) -> Result<(u32, u32), AutomationError> {
        Ok(self.screen)
    }
}

struct StubWindow {
    name: String,
    bounds: WindowBounds,
}

/// A mutable window table. Placement operations update the stored bounds
/// so callers can verify them through `position`.
pub struct StubWindowManager {
    windows: Mutex<Vec<StubWindow>>,
}

impl StubWindowManager {
    pub fn new() -> Self {
        Self::with_windows(vec![
            ("Editor".to_string(), WindowBounds { x: 100, y: 100, width: 800, height: 600 }),
            ("Terminal".to_string(), WindowBounds { x: 0, y: 0, width: 640, height: 480 }),
        ])
    }

    pub fn with_windows(windows: Vec<(String, WindowBounds)>) -> Self {
        Self {
            windows: Mutex::new(
                windows
                    .into_iter()
                    .map(|(name, bounds)| StubWindow { name, bounds })
                    .collect(),
            ),
        }
    }

    fn update(
        &self,
        app: &str,
        f: impl FnOnce(&mut WindowBounds),
    ) -> Result<(), AutomationError> {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let needle = app.to_lowercase();
        match windows.iter_mut().find(|w| w.name.to_lowercase().contains(&needle)) {
            Some(window) => {
                f(&mut window.bounds);
                Ok(())
            }
            None => Err(AutomationError::NotFound(format!("Window not found: {app}"))),
        }
    }
}

impl Default for StubWindowManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl WindowManager for StubWindowManager {
    async fn position(&self, app: &str) -> Result<WindowBounds, AutomationError> {
        let windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let needle = app.to_lowercase();
        windows
            .iter()
            .find(|w| w.name.to_lowercase().contains(&needle))
            .map(|w| w.bounds)
            .ok_or_else(|| AutomationError::NotFound(format!("Window not found: {app}")))
    }

    async fn move_window(&self, app: &str, x: i32, y: i32) -> Result<(), AutomationError> {
        self.update(app, |bounds| {
            bounds.x = x;
            bounds.y = y;
        })
    }

    async fn resize_window(&self, app: &str, width: u32, height: u32) -> Result<(), AutomationError> {
        self.update(app, |bounds| {
            bounds.width = width as i32;
            bounds.height = height as i32;
        })
    }

    async fn list(&self) -> Result<Vec<String>, AutomationError> {
        let windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(windows.iter().map(|w| w.name.clone()).collect())
    }

    async fn foreground_bounds(&self) -> Result<WindowBounds, AutomationError> {
        let windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        windows
            .first()
            .map(|w| w.bounds)
            .ok_or_else(|| AutomationError::NotFound("No focused window".to_string()))
    }

    async fn activate(&self, app: &str) -> Result<(), AutomationError> {
        self.update(app, |_| {})
    }
}

/// Serves a fixed element tree for the windows the stub manager knows.
pub struct StubAccessibility;

impl StubAccessibility {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StubAccessibility {
    fn default() -> Self {
        Self::new()
    }
}

fn element(kind: &str, name: &str, x: i32, y: i32, w: i32, h: i32) -> UiElement {
    UiElement {
        kind: kind.to_string(),
        name: name.to_string(),
        position: Point { x, y },
        size: Size { w, h },
        checked: None,
        value: None,
    }
}

#[async_trait::async_trait]
impl AccessibilityProvider for StubAccessibility {
    async fn elements(&self, app: &str) -> Result<Vec<UiElement>, AutomationError> {
        if !app.to_lowercase().contains("editor") {
            return Err(AutomationError::NotFound(format!(
                "Application not found: {app}"
            )));
        }
        let mut wrap = element("checkbox", "Wrap lines", 100, 240, 120, 20);
        wrap.checked = Some(true);
        let mut search = element("textfield", "Search", 300, 50, 200, 24);
        search.value = Some(String::new());
        Ok(vec![
            element("button", "Save", 100, 200, 80, 30),
            element("button", "Cancel", 200, 200, 80, 30),
            wrap,
            search,
        ])
    }
}

/// Captures copied text instead of touching the system clipboard.
#[derive(Default)]
pub struct StubClipboard {
    contents: Mutex<Option<String>>,
}

impl StubClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Option<String> {
        self.contents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ClipboardAccess for StubClipboard {
    fn copy(&self, text: &str) -> Result<(), AutomationError> {
        *self.contents.lock().unwrap_or_else(PoisonError::into_inner) = Some(text.to_string());
        Ok(())
    }
}

/// Backends for `--stub` mode. The process runner is the real shell
/// runner; everything else is simulated.
pub fn stub_backends() -> DesktopBackends {
    DesktopBackends {
        input: Arc::new(StubInput::new()),
        windows: Arc::new(StubWindowManager::new()),
        capturer: Arc::new(StubCapturer::new()),
        accessibility: Arc::new(StubAccessibility::new()),
        process: Arc::new(ShellRunner::new()),
        clipboard: Arc::new(StubClipboard::new()),
    }
}
