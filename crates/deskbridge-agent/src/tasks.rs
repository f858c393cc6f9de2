//! Multi-step task execution.
//!
//! Tasks are JSON files in a fixed directory, each holding an ordered list
//! of steps. Steps run sequentially through the dispatcher; a failing step
//! is recorded and execution continues, so the report always covers every
//! step.

use crate::dispatch::Dispatcher;
use crate::protocol::CommandEnvelope;
use deskbridge::AutomationError;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Upper bound for `wait` steps and `wait_after` pauses.
const MAX_STEP_PAUSE_SECS: f64 = 3600.0;

#[derive(Debug, Default, Deserialize)]
struct TaskFile {
    name: Option<String>,
    description: Option<String>,
    #[serde(default)]
    steps: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct Step {
    name: Option<String>,
    action: Option<String>,
    #[serde(default)]
    params: Value,
    wait_after: Option<f64>,
}

fn pause(seconds: f64) -> Duration {
    if seconds.is_finite() {
        Duration::from_secs_f64(seconds.clamp(0.0, MAX_STEP_PAUSE_SECS))
    } else {
        Duration::ZERO
    }
}

pub struct TaskRunner {
    tasks_dir: PathBuf,
}

impl TaskRunner {
    pub fn new(tasks_dir: impl Into<PathBuf>) -> Self {
        Self {
            tasks_dir: tasks_dir.into(),
        }
    }

    fn load(&self, name: &str) -> Result<TaskFile, AutomationError> {
        let file = if name.ends_with(".json") {
            name.to_string()
        } else {
            format!("{name}.json")
        };
        let path = self.tasks_dir.join(file);
        if !path.exists() {
            return Err(AutomationError::NotFound(format!(
                "Task not found: {}",
                path.display()
            )));
        }
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            AutomationError::ExternalFailure(format!("Failed to read task: {e}"))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| AutomationError::ParseError(format!("Invalid JSON: {e}")))
    }

    /// Run the named task to completion and produce the run report.
    pub async fn run(
        &self,
        dispatcher: &Dispatcher,
        name: &str,
    ) -> Result<Value, AutomationError> {
        if name.is_empty() {
            return Err(AutomationError::InvalidInput("task name required".to_string()));
        }
        let task = self.load(name)?;
        if task.steps.is_empty() {
            return Err(AutomationError::InvalidInput("Task has no steps".to_string()));
        }

        let title = task.name.clone().unwrap_or_else(|| name.to_string());
        info!(task = %title, steps = task.steps.len(), "running task");

        let total_steps = task.steps.len();
        let mut results = Vec::with_capacity(total_steps);
        for (index, raw_step) in task.steps.into_iter().enumerate() {
            let step: Step = serde_json::from_value(raw_step).unwrap_or_default();
            let step_no = index + 1;
            let step_name = step
                .name
                .clone()
                .unwrap_or_else(|| format!("Step {step_no}"));

            let Some(action) = step.action.filter(|a| !a.is_empty()) else {
                results.push(json!({
                    "step": step_no,
                    "name": step_name,
                    "status": "skipped",
                    "reason": "No action specified",
                }));
                continue;
            };

            // `wait` is a runner-level sentinel, not a registered action.
            if action == "wait" {
                let seconds = step.params.get("seconds").and_then(Value::as_f64).unwrap_or(1.0);
                tokio::time::sleep(pause(seconds)).await;
                results.push(json!({
                    "step": step_no,
                    "name": step_name,
                    "action": "wait",
                    "status": "success",
                    "seconds": seconds,
                }));
                continue;
            }

            let command = CommandEnvelope {
                id: String::new(),
                action: action.clone(),
                params: step.params,
            };
            let result = dispatcher.dispatch(&command).await;
            let status = result
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("success")
                .to_string();
            debug!(step = step_no, action = %action, status = %status, "task step finished");

            let mut entry = Map::new();
            entry.insert("step".to_string(), json!(step_no));
            entry.insert("name".to_string(), Value::String(step_name));
            entry.insert("action".to_string(), Value::String(action));
            entry.insert("status".to_string(), Value::String(status.clone()));
            if status == "error" {
                let message = result
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("Step failed")
                    .to_string();
                entry.insert("message".to_string(), Value::String(message));
            } else {
                entry.insert("result".to_string(), result);
            }
            results.push(Value::Object(entry));

            if let Some(wait_after) = step.wait_after.filter(|w| *w > 0.0) {
                tokio::time::sleep(pause(wait_after)).await;
            }
        }

        let success = results
            .iter()
            .filter(|r| r["status"] == "success")
            .count();
        let errors = results.iter().filter(|r| r["status"] == "error").count();

        Ok(json!({
            "status": if errors == 0 { "success" } else { "partial" },
            "action": "run_task",
            "task": title,
            "total_steps": total_steps,
            "success": success,
            "errors": errors,
            "results": results,
        }))
    }

    /// Enumerate task definitions without executing them.
    pub fn list(&self) -> Value {
        if !self.tasks_dir.exists() {
            return json!({ "status": "success", "tasks": [], "count": 0 });
        }

        let mut files: Vec<String> = std::fs::read_dir(&self.tasks_dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter_map(|e| e.file_name().into_string().ok())
                    .filter(|name| name.ends_with(".json"))
                    .collect()
            })
            .unwrap_or_default();
        files.sort();

        let mut tasks = Vec::with_capacity(files.len());
        for file in files {
            let path = self.tasks_dir.join(&file);
            let parsed: Option<TaskFile> = std::fs::read_to_string(&path)
                .ok()
                .and_then(|raw| serde_json::from_str(&raw).ok());
            match parsed {
                Some(task) => tasks.push(json!({
                    "file": file,
                    "name": task.name.unwrap_or_else(|| file.clone()),
                    "description": task.description.unwrap_or_default(),
                    "steps": task.steps.len(),
                })),
                None => tasks.push(json!({
                    "file": file,
                    "name": file,
                    "description": "Error loading task",
                    "steps": 0,
                })),
            }
        }

        json!({
            "status": "success",
            "action": "list_tasks",
            "tasks": tasks,
            "count": tasks.len(),
        })
    }
}
