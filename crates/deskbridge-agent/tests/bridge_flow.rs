//! End-to-end flows over the stub backends: command slot in, result slot
//! out, with the full action surface registered.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;

use deskbridge::browser::StubLauncher;
use deskbridge::{AutomationError, CaptureService, Desktop};
use deskbridge_agent::dispatch::Dispatcher;
use deskbridge_agent::handlers::{self, BridgeContext};
use deskbridge_agent::poll::{PollLoop, PollOutcome};
use deskbridge_agent::protocol::{CommandEnvelope, ResultWriter};
use deskbridge_agent::registry::ActionRegistry;
use deskbridge_agent::tasks::TaskRunner;

fn bridge(dir: &TempDir) -> (Arc<BridgeContext>, Arc<Dispatcher>) {
    let desktop = Desktop::new(true).unwrap();
    let capture = CaptureService::new(
        desktop.capturer(),
        desktop.window_manager(),
        dir.path().join("screenshots"),
    )
    .unwrap();
    let tasks = TaskRunner::new(dir.path().join("tasks"));
    let context = BridgeContext::new(desktop, capture, tasks, Arc::new(StubLauncher), true);

    let mut registry = ActionRegistry::new();
    handlers::register_all(&mut registry, &context).unwrap();
    let dispatcher = Arc::new(Dispatcher::new(registry));
    context.wire_dispatcher(dispatcher.clone());
    (context, dispatcher)
}

fn command(id: &str, action: &str, params: Value) -> CommandEnvelope {
    CommandEnvelope {
        id: id.to_string(),
        action: action.to_string(),
        params,
    }
}

#[tokio::test]
async fn commands_flow_from_slot_to_result() {
    let dir = TempDir::new().unwrap();
    let (_context, dispatcher) = bridge(&dir);
    let command_path = dir.path().join("command.json");
    let result_path = dir.path().join("result.json");
    let mut poll = PollLoop::new(
        &command_path,
        ResultWriter::new(&result_path),
        dispatcher,
        Duration::from_millis(10),
    );

    assert_eq!(poll.poll_once().await, PollOutcome::Idle);

    std::fs::write(
        &command_path,
        json!({"id": "e2e-1", "action": "click", "params": {"x": 10, "y": 20}}).to_string(),
    )
    .unwrap();
    assert_eq!(
        poll.poll_once().await,
        PollOutcome::Dispatched("e2e-1".to_string())
    );

    let result: Value =
        serde_json::from_str(&std::fs::read_to_string(&result_path).unwrap()).unwrap();
    assert_eq!(result["status"], "success");
    assert_eq!(result["action"], "click");
    assert_eq!(result["real_coords"], json!([10, 20]));
    assert_eq!(result["command_id"], "e2e-1");
    assert!(result["timestamp"].as_str().unwrap().contains('T'));

    // The slot still holds the consumed id; nothing happens again.
    assert_eq!(poll.poll_once().await, PollOutcome::Idle);
}

#[tokio::test]
async fn every_advertised_action_is_registered() {
    let dir = TempDir::new().unwrap();
    let (_context, dispatcher) = bridge(&dir);
    let actions = dispatcher.registry().actions();

    for name in [
        "screenshot",
        "click",
        "move",
        "scroll",
        "mouse",
        "drag",
        "type",
        "type_raw",
        "key",
        "window_move",
        "window_resize",
        "window_position",
        "windows_list",
        "scroll_app",
        "get_ui_elements",
        "click_element",
        "run",
        "terminal_run",
        "screen",
        "status",
        "web_open",
        "web_close",
        "web_goto",
        "web_find",
        "web_click",
        "web_type",
        "web_text",
        "web_exists",
        "web_wait",
        "web_screenshot",
        "web_source",
        "web_elements",
        "web_execute",
        "web_info",
        "web_scroll",
        "run_task",
        "list_tasks",
    ] {
        assert!(actions.iter().any(|a| a == name), "missing action: {name}");
    }
    assert_eq!(actions.len(), 37);
}

#[tokio::test]
async fn registering_the_surface_twice_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let (context, _dispatcher) = bridge(&dir);

    let mut registry = ActionRegistry::new();
    handlers::register_all(&mut registry, &context).unwrap();
    let err = handlers::register_all(&mut registry, &context).unwrap_err();
    assert!(matches!(err, AutomationError::ConfigError(_)));
}

#[tokio::test]
async fn a_task_file_runs_step_by_step() {
    let dir = TempDir::new().unwrap();
    let tasks_dir = dir.path().join("tasks");
    std::fs::create_dir_all(&tasks_dir).unwrap();
    std::fs::write(
        tasks_dir.join("smoke.json"),
        json!({
            "name": "Smoke",
            "description": "poke the desktop",
            "steps": [
                {"name": "look", "action": "screen"},
                {"name": "point", "action": "move", "params": {"x": 5, "y": 5}},
                {"name": "ghost", "action": "window_position", "params": {"app": "Ghost"}},
            ],
        })
        .to_string(),
    )
    .unwrap();

    let (_context, dispatcher) = bridge(&dir);
    let report = dispatcher
        .dispatch(&command("t-1", "run_task", json!({"task": "smoke"})))
        .await;

    assert_eq!(report["status"], "partial");
    assert_eq!(report["task"], "Smoke");
    assert_eq!(report["total_steps"], 3);
    assert_eq!(report["success"], 2);
    assert_eq!(report["errors"], 1);
    assert_eq!(report["results"][0]["result"]["status"], "success");
    assert_eq!(report["results"][2]["message"], "Window not found: Ghost");

    let listing = dispatcher
        .dispatch(&command("t-2", "list_tasks", json!({})))
        .await;
    assert_eq!(listing["count"], 1);
    assert_eq!(listing["tasks"][0]["name"], "Smoke");
    assert_eq!(listing["tasks"][0]["steps"], 3);
}

#[tokio::test]
async fn browser_commands_share_one_session() {
    let dir = TempDir::new().unwrap();
    let (_context, dispatcher) = bridge(&dir);

    let open = dispatcher
        .dispatch(&command("w1", "web_open", json!({"url": "https://example.com"})))
        .await;
    assert_eq!(open["message"], "Browser opened");
    assert_eq!(open["url"], "https://example.com");

    let click = dispatcher
        .dispatch(&command("w2", "web_click", json!({"selector": "#login"})))
        .await;
    assert_eq!(click["status"], "success");
    assert_eq!(click["tag"], "button");

    let close = dispatcher
        .dispatch(&command("w3", "web_close", json!({})))
        .await;
    assert_eq!(close["message"], "Browser closed");

    let after = dispatcher
        .dispatch(&command("w4", "web_info", json!({})))
        .await;
    assert_eq!(after["status"], "error");
    assert_eq!(after["message"], "No browser session. Use web_open first.");
}

#[tokio::test]
async fn status_over_the_wire_reports_the_session() {
    let dir = TempDir::new().unwrap();
    let (context, dispatcher) = bridge(&dir);
    let command_path = dir.path().join("command.json");
    let result_path = dir.path().join("result.json");
    let mut poll = PollLoop::new(
        &command_path,
        ResultWriter::new(&result_path),
        dispatcher,
        Duration::from_millis(10),
    );

    std::fs::write(
        &command_path,
        json!({"id": "s1", "action": "status"}).to_string(),
    )
    .unwrap();
    assert_eq!(
        poll.poll_once().await,
        PollOutcome::Dispatched("s1".to_string())
    );

    let result: Value =
        serde_json::from_str(&std::fs::read_to_string(&result_path).unwrap()).unwrap();
    assert_eq!(result["status"], "running");
    assert_eq!(result["backend"], "stub");
    assert_eq!(result["session"], context.session());
    assert_eq!(result["command_id"], "s1");
}
