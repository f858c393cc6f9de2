use crate::platforms::ClipboardAccess;
use crate::AutomationError;

/// System clipboard access through arboard. A fresh handle is opened per
/// call; arboard handles are not `Sync` and writes are rare.
pub struct SystemClipboard;

impl SystemClipboard {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemClipboard {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipboardAccess for SystemClipboard {
    fn copy(&self, text: &str) -> Result<(), AutomationError> {
        let mut clipboard = arboard::Clipboard::new().map_err(|e| {
            AutomationError::ExternalFailure(format!("Clipboard unavailable: {e}"))
        })?;
        clipboard
            .set_text(text)
            .map_err(|e| AutomationError::ExternalFailure(format!("Clipboard write failed: {e}")))
    }
}
