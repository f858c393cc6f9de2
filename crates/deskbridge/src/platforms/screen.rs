use crate::platforms::Capturer;
use crate::AutomationError;
use xcap::Monitor;

/// Captures the primary monitor through xcap.
pub struct XcapCapturer;

impl XcapCapturer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for XcapCapturer {
    fn default() -> Self {
        Self::new()
    }
}

fn primary_monitor() -> Result<Monitor, AutomationError> {
    let monitors = Monitor::all()
        .map_err(|e| AutomationError::ExternalFailure(format!("Failed to list monitors: {e}")))?;

    let mut fallback = None;
    for monitor in monitors {
        if monitor.is_primary().unwrap_or(false) {
            return Ok(monitor);
        }
        if fallback.is_none() {
            fallback = Some(monitor);
        }
    }
    fallback.ok_or_else(|| AutomationError::ExternalFailure("No monitors detected".to_string()))
}

impl Capturer for XcapCapturer {
    fn frame(&self) -> Result<image::RgbaImage, AutomationError> {
        let monitor = primary_monitor()?;
        monitor
            .capture_image()
            .map_err(|e| AutomationError::ExternalFailure(format!("Screen capture failed: {e}")))
    }

    fn screen_size(&self) -> Result<(u32, u32), AutomationError> {
        let monitor = primary_monitor()?;
        let width = monitor
            .width()
            .map_err(|e| AutomationError::ExternalFailure(format!("Monitor width failed: {e}")))?;
        let height = monitor
            .height()
            .map_err(|e| AutomationError::ExternalFailure(format!("Monitor height failed: {e}")))?;
        Ok((width, height))
    }
}
