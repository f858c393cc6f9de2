//! Action handler groups and the shared context they execute against.
//!
//! Every handler has the same shape: `async fn(Arc<BridgeContext>, Value)
//! -> Result<Value, AutomationError>`. The params object comes straight
//! from the command envelope; the returned value is the full result
//! payload the controller reads back.

mod accessibility;
mod keyboard;
mod mouse;
mod screenshot;
mod system;
mod web;
mod window;

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use deskbridge::{AutomationError, BrowserDriver, BrowserLauncher, CaptureService, Desktop};

use crate::dispatch::Dispatcher;
use crate::registry::ActionRegistry;
use crate::tasks::TaskRunner;

/// Everything the handlers share: the desktop facade, the capture service
/// with its scale state, the task runner, and the single browser session
/// slot.
pub struct BridgeContext {
    desktop: Desktop,
    capture: CaptureService,
    tasks: TaskRunner,
    launcher: Arc<dyn BrowserLauncher>,
    web: Mutex<Option<Arc<dyn BrowserDriver>>>,
    headless: bool,
    session: String,
    started_at: Instant,
    // Filled in after the dispatcher is built; run_task needs it to route
    // steps back through the registry.
    dispatcher: OnceLock<Arc<Dispatcher>>,
}

impl BridgeContext {
    pub fn new(
        desktop: Desktop,
        capture: CaptureService,
        tasks: TaskRunner,
        launcher: Arc<dyn BrowserLauncher>,
        headless: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            desktop,
            capture,
            tasks,
            launcher,
            web: Mutex::new(None),
            headless,
            session: Uuid::new_v4().to_string(),
            started_at: Instant::now(),
            dispatcher: OnceLock::new(),
        })
    }

    pub fn wire_dispatcher(&self, dispatcher: Arc<Dispatcher>) {
        let _ = self.dispatcher.set(dispatcher);
    }

    fn dispatcher(&self) -> Result<&Dispatcher, AutomationError> {
        self.dispatcher
            .get()
            .map(Arc::as_ref)
            .ok_or_else(|| AutomationError::ConfigError("Dispatcher not wired".to_string()))
    }

    pub fn desktop(&self) -> &Desktop {
        &self.desktop
    }

    pub fn capture(&self) -> &CaptureService {
        &self.capture
    }

    pub fn tasks(&self) -> &TaskRunner {
        &self.tasks
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    fn headless_default(&self) -> bool {
        self.headless
    }

    async fn web_session(&self) -> MutexGuard<'_, Option<Arc<dyn BrowserDriver>>> {
        self.web.lock().await
    }

    /// The live browser session, or the error every `web_*` action except
    /// `web_open` reports without one.
    async fn driver(&self) -> Result<Arc<dyn BrowserDriver>, AutomationError> {
        self.web.lock().await.clone().ok_or_else(|| {
            AutomationError::InvalidInput("No browser session. Use web_open first.".to_string())
        })
    }
}

/// Deserialize a params object into a typed argument struct.
fn parse_args<T: DeserializeOwned>(params: Value) -> Result<T, AutomationError> {
    serde_json::from_value(params)
        .map_err(|e| AutomationError::InvalidInput(format!("Invalid parameters: {e}")))
}

async fn run_task(ctx: Arc<BridgeContext>, params: Value) -> Result<Value, AutomationError> {
    #[derive(serde::Deserialize)]
    struct Args {
        #[serde(default)]
        task: String,
    }
    let args: Args = parse_args(params)?;
    ctx.tasks().run(ctx.dispatcher()?, &args.task).await
}

async fn list_tasks(ctx: Arc<BridgeContext>, _params: Value) -> Result<Value, AutomationError> {
    Ok(ctx.tasks().list())
}

/// Register the whole action surface. Fails with `ConfigError` when two
/// groups claim the same name.
pub fn register_all(
    registry: &mut ActionRegistry,
    context: &Arc<BridgeContext>,
) -> Result<(), AutomationError> {
    macro_rules! action {
        ($name:literal, $handler:path) => {{
            let ctx = Arc::clone(context);
            registry.register_fn($name, move |params| $handler(Arc::clone(&ctx), params))?;
        }};
    }

    action!("screenshot", screenshot::screenshot);

    action!("click", mouse::click);
    action!("move", mouse::move_pointer);
    action!("scroll", mouse::scroll);
    action!("mouse", mouse::position);
    action!("drag", mouse::drag);

    action!("type", keyboard::type_text);
    action!("type_raw", keyboard::type_raw);
    action!("key", keyboard::key);

    action!("window_move", window::window_move);
    action!("window_resize", window::window_resize);
    action!("window_position", window::window_position);
    action!("windows_list", window::windows_list);
    action!("scroll_app", window::scroll_app);

    action!("get_ui_elements", accessibility::get_ui_elements);
    action!("click_element", accessibility::click_element);

    action!("run", system::run);
    action!("terminal_run", system::terminal_run);
    action!("screen", system::screen);
    action!("status", system::status);

    action!("web_open", web::open);
    action!("web_close", web::close);
    action!("web_goto", web::goto);
    action!("web_find", web::find);
    action!("web_click", web::click);
    action!("web_type", web::type_text);
    action!("web_text", web::text);
    action!("web_exists", web::exists);
    action!("web_wait", web::wait);
    action!("web_screenshot", web::screenshot);
    action!("web_source", web::source);
    action!("web_elements", web::elements);
    action!("web_execute", web::execute);
    action!("web_info", web::info);
    action!("web_scroll", web::scroll);

    action!("run_task", run_task);
    action!("list_tasks", list_tasks);

    Ok(())
}
