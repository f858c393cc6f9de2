//! UI element enumeration and name-based clicking.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use deskbridge::{AutomationError, MouseButton, UiElement};

use super::{parse_args, BridgeContext};

fn element_entry(element: &UiElement) -> Value {
    let center = element.center();
    let mut entry = json!({
        "type": element.kind,
        "name": element.name,
        "position": {"x": element.position.x, "y": element.position.y},
        "size": {"w": element.size.w, "h": element.size.h},
        "center": {"x": center.x, "y": center.y},
    });
    if let Some(checked) = element.checked {
        entry["checked"] = json!(checked);
    }
    if let Some(value) = &element.value {
        entry["value"] = json!(value);
    }
    entry
}

#[derive(Debug, Deserialize)]
struct ElementsArgs {
    #[serde(default)]
    app: String,
}

pub(super) async fn get_ui_elements(
    ctx: Arc<BridgeContext>,
    params: Value,
) -> Result<Value, AutomationError> {
    let args: ElementsArgs = parse_args(params)?;
    if args.app.is_empty() {
        return Err(AutomationError::InvalidInput("App name required".to_string()));
    }

    let elements = ctx.desktop().ui_elements(&args.app).await?;
    let listed: Vec<Value> = elements.iter().map(element_entry).collect();

    Ok(json!({
        "status": "success",
        "action": "get_ui_elements",
        "app": args.app,
        "count": listed.len(),
        "elements": listed,
    }))
}

#[derive(Debug, Deserialize)]
struct ClickElementArgs {
    #[serde(default)]
    app: String,
    #[serde(default)]
    element: String,
}

/// Click an element by (partial, case-insensitive) name, aiming at its
/// center.
pub(super) async fn click_element(
    ctx: Arc<BridgeContext>,
    params: Value,
) -> Result<Value, AutomationError> {
    let args: ClickElementArgs = parse_args(params)?;
    if args.app.is_empty() || args.element.is_empty() {
        return Err(AutomationError::InvalidInput(
            "app and element required".to_string(),
        ));
    }

    let elements = ctx.desktop().ui_elements(&args.app).await?;
    let needle = args.element.to_lowercase();
    let target = elements
        .iter()
        .find(|e| e.name.to_lowercase().contains(&needle))
        .ok_or_else(|| {
            AutomationError::NotFound(format!("Element not found: {}", args.element))
        })?;

    let center = target.center();
    ctx.desktop()
        .click_at(center.x, center.y, MouseButton::Left, 1)
        .await?;

    Ok(json!({
        "status": "success",
        "action": "click_element",
        "app": args.app,
        "element": target.name,
        "type": target.kind,
        "clicked_at": {"x": center.x, "y": center.y},
    }))
}
