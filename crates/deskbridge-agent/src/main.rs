use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use deskbridge::browser::StubLauncher;
use deskbridge::{BrowserLauncher, CaptureService, CdpLauncher, Desktop};
use deskbridge_agent::dispatch::Dispatcher;
use deskbridge_agent::handlers::{self, BridgeContext};
use deskbridge_agent::poll::{PollLoop, DEFAULT_POLL_INTERVAL};
use deskbridge_agent::protocol::{ready_payload, ResultWriter};
use deskbridge_agent::registry::ActionRegistry;
use deskbridge_agent::tasks::TaskRunner;
use deskbridge_agent::utils::init_logging;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Deskbridge - file-polling desktop and browser automation agent"
)]
struct Args {
    /// Directory holding command.json and result.json
    #[arg(long, env = "DESKBRIDGE_DIR", default_value = ".")]
    bridge_dir: PathBuf,

    /// Task definitions directory (default: <bridge-dir>/tasks)
    #[arg(long, env = "DESKBRIDGE_TASKS_DIR")]
    tasks_dir: Option<PathBuf>,

    /// Screenshot output directory (default: <bridge-dir>/screenshots)
    #[arg(long, env = "DESKBRIDGE_SCREENSHOTS_DIR")]
    screenshots_dir: Option<PathBuf>,

    /// Command slot poll interval in milliseconds
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL.as_millis() as u64)]
    poll_interval_ms: u64,

    /// Run against the stub backends instead of the live desktop
    #[arg(long, env = "DESKBRIDGE_STUB")]
    stub: bool,

    /// Open browser sessions headless unless the command says otherwise
    #[arg(long, env = "DESKBRIDGE_HEADLESS")]
    headless: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git = option_env!("GIT_HASH").unwrap_or("unknown"),
        "starting deskbridge agent"
    );

    let bridge_dir = args.bridge_dir;
    tokio::fs::create_dir_all(&bridge_dir)
        .await
        .with_context(|| format!("creating bridge directory {}", bridge_dir.display()))?;
    let tasks_dir = args.tasks_dir.unwrap_or_else(|| bridge_dir.join("tasks"));
    let screenshots_dir = args
        .screenshots_dir
        .unwrap_or_else(|| bridge_dir.join("screenshots"));

    let desktop = Desktop::new(args.stub)?;
    info!(backend = desktop.backend_name(), "desktop backends ready");
    let capture = CaptureService::new(
        desktop.capturer(),
        desktop.window_manager(),
        &screenshots_dir,
    )?;
    let tasks = TaskRunner::new(&tasks_dir);
    let launcher: Arc<dyn BrowserLauncher> = if args.stub {
        Arc::new(StubLauncher)
    } else {
        Arc::new(CdpLauncher::new())
    };
    let context = BridgeContext::new(desktop, capture, tasks, launcher, args.headless);

    let mut registry = ActionRegistry::new();
    handlers::register_all(&mut registry, &context)?;
    info!(actions = registry.len(), "action registry ready");
    let dispatcher = Arc::new(Dispatcher::new(registry));
    context.wire_dispatcher(Arc::clone(&dispatcher));

    let writer = ResultWriter::new(bridge_dir.join("result.json"));
    writer
        .write(ready_payload(context.session(), env!("CARGO_PKG_VERSION")))
        .await?;

    // Controllers size their clicks against this first frame. Not having
    // one is survivable; conversion stays 1:1 until a capture lands.
    if let Err(e) = context.capture().reference() {
        warn!(error = %e, "reference screenshot failed at boot");
    }

    let poll = PollLoop::new(
        bridge_dir.join("command.json"),
        writer,
        dispatcher,
        Duration::from_millis(args.poll_interval_ms),
    );
    info!(
        command = %poll.command_path().display(),
        tasks = %tasks_dir.display(),
        session = context.session(),
        "bridge ready"
    );

    tokio::select! {
        _ = poll.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
        }
    }

    Ok(())
}
