//! Command file polling.
//!
//! Watches a single command slot that an external controller overwrites.
//! A command is consumed at most once per distinct non-empty `id`; the
//! loop never exits on handler, parse, or I/O failures.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::dispatch::Dispatcher;
use crate::protocol::{CommandEnvelope, ResultWriter};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// The producer may be mid-write when the slot fails to parse.
const PARSE_RETRY: Duration = Duration::from_millis(300);
const FAULT_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing new in the slot.
    Idle,
    /// A command was dispatched and its result published.
    Dispatched(String),
    /// The slot held invalid JSON.
    ParseFailure,
    /// An I/O problem reading the slot or publishing the result.
    Fault,
}

pub struct PollLoop {
    command_path: PathBuf,
    writer: ResultWriter,
    dispatcher: Arc<Dispatcher>,
    interval: Duration,
    last_id: Option<String>,
}

impl PollLoop {
    pub fn new(
        command_path: impl Into<PathBuf>,
        writer: ResultWriter,
        dispatcher: Arc<Dispatcher>,
        interval: Duration,
    ) -> Self {
        Self {
            command_path: command_path.into(),
            writer,
            dispatcher,
            interval,
            last_id: None,
        }
    }

    pub fn command_path(&self) -> &Path {
        &self.command_path
    }

    /// One poll cycle: read the slot, dispatch if it holds an unseen
    /// command id, publish the result.
    pub async fn poll_once(&mut self) -> PollOutcome {
        let raw = match tokio::fs::read_to_string(&self.command_path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return PollOutcome::Idle,
            Err(err) => {
                warn!(path = %self.command_path.display(), "Failed to read command file: {err}");
                return PollOutcome::Fault;
            }
        };

        let command = match CommandEnvelope::parse(&raw) {
            Ok(command) => command,
            Err(err) => {
                // No error result for this one: the producer may still be
                // writing, so the slot is left alone and re-read shortly.
                debug!("Command slot not parseable yet: {err}");
                return PollOutcome::ParseFailure;
            }
        };

        if command.id.is_empty() || self.last_id.as_deref() == Some(command.id.as_str()) {
            return PollOutcome::Idle;
        }

        let id = command.id.clone();
        info!(id = %id, action = %command.action, "Processing command");
        let mut result = self.dispatcher.dispatch(&command).await;
        if let Some(fields) = result.as_object_mut() {
            fields.insert("command_id".to_string(), json!(id));
        }

        if let Err(err) = self.writer.write(result).await {
            // last_id stays untouched so the command is retried next cycle.
            error!(id = %id, "Failed to publish result: {err}");
            return PollOutcome::Fault;
        }

        self.last_id = Some(id.clone());
        PollOutcome::Dispatched(id)
    }

    fn delay_for(&self, outcome: &PollOutcome) -> Duration {
        match outcome {
            PollOutcome::Idle | PollOutcome::Dispatched(_) => self.interval,
            PollOutcome::ParseFailure => PARSE_RETRY,
            PollOutcome::Fault => FAULT_BACKOFF,
        }
    }

    /// Runs until the surrounding task is cancelled.
    pub async fn run(mut self) {
        info!(
            path = %self.command_path.display(),
            interval_ms = self.interval.as_millis() as u64,
            "Watching command file"
        );
        loop {
            let outcome = self.poll_once().await;
            tokio::time::sleep(self.delay_for(&outcome)).await;
        }
    }
}
