//! Command dispatch with fault and panic containment.

use crate::protocol::{error_payload, CommandEnvelope};
use crate::registry::ActionRegistry;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, instrument, warn};

/// Routes commands to registered handlers. Every failure mode, including a
/// panicking handler, comes back as an error payload so the poll loop
/// survives.
pub struct Dispatcher {
    registry: Arc<ActionRegistry>,
}

impl Dispatcher {
    pub fn new(registry: ActionRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    #[instrument(skip(self, command), fields(action = %command.action))]
    pub async fn dispatch(&self, command: &CommandEnvelope) -> Value {
        let Some(handler) = self.registry.get(&command.action) else {
            return json!({
                "status": "error",
                "message": format!("Unknown action: {}", command.action),
            });
        };

        let params = command.params_object();
        // Handlers run in their own task; a panic surfaces as a JoinError
        // here instead of unwinding into the poll loop.
        let outcome = tokio::spawn(async move { handler(params).await }).await;

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(fault)) => {
                warn!(action = %command.action, error = %fault, "action failed");
                error_payload(&fault)
            }
            Err(join_error) => {
                let reason = if join_error.is_panic() {
                    match join_error.try_into_panic().downcast::<String>() {
                        Ok(message) => *message,
                        Err(payload) => payload
                            .downcast::<&str>()
                            .map(|s| s.to_string())
                            .unwrap_or_else(|_| "handler panicked".to_string()),
                    }
                } else {
                    "handler cancelled".to_string()
                };
                error!(action = %command.action, reason, "action crashed");
                json!({ "status": "error", "message": reason })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskbridge::AutomationError;

    fn command(action: &str, params: Value) -> CommandEnvelope {
        CommandEnvelope {
            id: "t1".to_string(),
            action: action.to_string(),
            params,
        }
    }

    #[tokio::test]
    async fn unknown_actions_produce_an_error_result() {
        let dispatcher = Dispatcher::new(ActionRegistry::new());
        let result = dispatcher.dispatch(&command("frobnicate", json!({}))).await;
        assert_eq!(result["status"], "error");
        assert_eq!(result["message"], "Unknown action: frobnicate");
    }

    #[tokio::test]
    async fn handler_faults_become_error_payloads() {
        let mut registry = ActionRegistry::new();
        registry
            .register_fn("boom", |_| async {
                Err(AutomationError::NotFound("Window not found: Editor".to_string()))
            })
            .unwrap();
        let dispatcher = Dispatcher::new(registry);

        let result = dispatcher.dispatch(&command("boom", json!({}))).await;
        assert_eq!(result["status"], "error");
        assert_eq!(result["message"], "Window not found: Editor");
    }

    #[tokio::test]
    async fn handler_panics_are_contained() {
        let mut registry = ActionRegistry::new();
        registry
            .register_fn("explode", |params| async move {
                if params.is_object() {
                    panic!("boom in handler");
                }
                Ok(json!({}))
            })
            .unwrap();
        let dispatcher = Dispatcher::new(registry);

        let result = dispatcher.dispatch(&command("explode", json!({}))).await;
        assert_eq!(result["status"], "error");
        assert_eq!(result["message"], "boom in handler");

        // The dispatcher stays usable after the panic.
        let again = dispatcher.dispatch(&command("explode", json!({}))).await;
        assert_eq!(again["status"], "error");
    }

    #[tokio::test]
    async fn successful_results_pass_through_unchanged() {
        let mut registry = ActionRegistry::new();
        registry
            .register_fn("echo", |params| async move {
                Ok(json!({"status": "success", "echo": params}))
            })
            .unwrap();
        let dispatcher = Dispatcher::new(registry);

        let result = dispatcher
            .dispatch(&command("echo", json!({"k": "v"})))
            .await;
        assert_eq!(result["status"], "success");
        assert_eq!(result["echo"]["k"], "v");
    }
}
