//! The `screenshot` action.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use deskbridge::AutomationError;

use super::{parse_args, BridgeContext};

#[derive(Debug, Deserialize)]
struct ScreenshotArgs {
    #[serde(default = "default_mode")]
    mode: String,
    #[serde(default)]
    x: i32,
    #[serde(default)]
    y: i32,
    #[serde(default = "default_region_w")]
    w: u32,
    #[serde(default = "default_region_h")]
    h: u32,
}

fn default_mode() -> String {
    "full".to_string()
}

fn default_region_w() -> u32 {
    800
}

fn default_region_h() -> u32 {
    600
}

/// Capture per `mode`; anything unrecognized falls back to a full capture.
pub(super) async fn screenshot(
    ctx: Arc<BridgeContext>,
    params: Value,
) -> Result<Value, AutomationError> {
    let args: ScreenshotArgs = parse_args(params)?;

    let info = match args.mode.as_str() {
        "reference" => ctx.capture().reference()?,
        "window" => ctx.capture().active_window().await?,
        "region" => ctx.capture().region(args.x, args.y, args.w, args.h)?,
        _ => ctx.capture().full()?,
    };

    let mut result = serde_json::to_value(&info)
        .map_err(|e| AutomationError::ParseError(format!("Capture payload: {e}")))?;
    if let Some(fields) = result.as_object_mut() {
        fields.insert("status".to_string(), json!("success"));
    }
    Ok(result)
}
