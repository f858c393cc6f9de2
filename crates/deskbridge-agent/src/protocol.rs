//! Command and result slots on disk.
//!
//! The producer drops a JSON object into the command slot; the agent
//! overwrites the result slot with a JSON object for every consumed
//! command. Result writes go through a temp file and a rename so readers
//! never observe a half-written slot.

use chrono::Utc;
use deskbridge::AutomationError;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

/// One command taken from the command slot.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandEnvelope {
    /// Consumption key. Commands with an empty id are never dispatched.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub params: Value,
}

impl CommandEnvelope {
    pub fn parse(raw: &str) -> Result<Self, AutomationError> {
        serde_json::from_str(raw)
            .map_err(|e| AutomationError::ParseError(format!("Invalid JSON: {e}")))
    }

    /// Params as an object; anything else collapses to `{}`.
    pub fn params_object(&self) -> Value {
        if self.params.is_object() {
            self.params.clone()
        } else {
            json!({})
        }
    }
}

/// Message for a wire-visible error. Taxonomy variants whose payload is
/// already a full sentence pass through bare; the rest keep their prefix.
pub fn error_message(error: &AutomationError) -> String {
    match error {
        AutomationError::NotFound(m)
        | AutomationError::InvalidInput(m)
        | AutomationError::ParseError(m)
        | AutomationError::ConfigError(m) => m.clone(),
        other => other.to_string(),
    }
}

pub fn error_payload(error: &AutomationError) -> Value {
    json!({ "status": "error", "message": error_message(error) })
}

/// Payload written once at boot, before any command is consumed.
pub fn ready_payload(session: &str, version: &str) -> Value {
    json!({
        "status": "ready",
        "message": "Bridge started",
        "session": session,
        "version": version,
    })
}

/// Overwrites the result slot atomically.
pub struct ResultWriter {
    path: PathBuf,
}

impl ResultWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stamp the payload with the current time and persist it. The slot is
    /// fully replaced; partial reads are impossible because the content
    /// lands via rename.
    pub async fn write(&self, mut payload: Value) -> Result<(), AutomationError> {
        if let Some(object) = payload.as_object_mut() {
            object.insert(
                "timestamp".to_string(),
                Value::String(Utc::now().to_rfc3339()),
            );
        }
        let body = serde_json::to_string_pretty(&payload)
            .map_err(|e| AutomationError::ParseError(format!("Unserializable result: {e}")))?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await.map_err(|e| {
            AutomationError::ExternalFailure(format!("Failed to write result: {e}"))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            AutomationError::ExternalFailure(format!("Failed to publish result: {e}"))
        })?;
        debug!(path = %self.path.display(), "result written");
        Ok(())
    }
}
