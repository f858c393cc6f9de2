//! Action name to handler mapping.

use deskbridge::AutomationError;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value, AutomationError>> + Send>>;

/// A registered action. Takes the command params object and produces the
/// full result payload or a fault.
pub type ActionHandler = Arc<dyn Fn(Value) -> HandlerFuture + Send + Sync>;

/// All dispatchable actions. Populated once during startup; duplicate
/// names are a wiring bug and refuse to register.
#[derive(Default)]
pub struct ActionRegistry {
    handlers: HashMap<String, ActionHandler>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, handler: ActionHandler) -> Result<(), AutomationError> {
        if self.handlers.contains_key(name) {
            return Err(AutomationError::ConfigError(format!(
                "Duplicate action registration: {name}"
            )));
        }
        self.handlers.insert(name.to_string(), handler);
        Ok(())
    }

    pub fn register_fn<F, Fut>(&mut self, name: &str, handler: F) -> Result<(), AutomationError>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, AutomationError>> + Send + 'static,
    {
        self.register(name, Arc::new(move |params| Box::pin(handler(params))))
    }

    pub fn get(&self, name: &str) -> Option<ActionHandler> {
        self.handlers.get(name).cloned()
    }

    /// Registered action names, sorted.
    pub fn actions(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
