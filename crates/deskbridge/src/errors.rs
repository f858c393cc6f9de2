use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Unsupported on this platform: {0}")]
    Unsupported(String),

    #[error("External call failed: {0}")]
    ExternalFailure(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AutomationError {
    /// True for faults raised by malformed JSON, either in the command slot
    /// or in a task definition file.
    pub fn is_parse_error(&self) -> bool {
        matches!(self, AutomationError::ParseError(_))
    }
}
