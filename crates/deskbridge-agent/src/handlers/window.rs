//! Window management actions.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use deskbridge::AutomationError;

use super::{parse_args, BridgeContext};

fn require_app(app: &str) -> Result<(), AutomationError> {
    if app.is_empty() {
        return Err(AutomationError::InvalidInput("App name required".to_string()));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct WindowMoveArgs {
    #[serde(default)]
    app: String,
    #[serde(default)]
    x: i32,
    #[serde(default)]
    y: i32,
}

/// Move a window and verify by re-reading its position afterwards.
pub(super) async fn window_move(
    ctx: Arc<BridgeContext>,
    params: Value,
) -> Result<Value, AutomationError> {
    let args: WindowMoveArgs = parse_args(params)?;
    require_app(&args.app)?;

    let before = ctx.desktop().window_position(&args.app).await.ok();
    ctx.desktop().move_window(&args.app, args.x, args.y).await?;
    let after = ctx.desktop().window_position(&args.app).await.ok();
    let verified = after.is_some_and(|b| b.x == args.x && b.y == args.y);

    Ok(json!({
        "status": "success",
        "action": "window_move",
        "app": args.app,
        "target": [args.x, args.y],
        "before": before,
        "after": after,
        "verified": verified,
    }))
}

#[derive(Debug, Deserialize)]
struct WindowResizeArgs {
    #[serde(default)]
    app: String,
    #[serde(default = "default_width")]
    width: u32,
    #[serde(default = "default_height")]
    height: u32,
}

fn default_width() -> u32 {
    800
}

fn default_height() -> u32 {
    600
}

pub(super) async fn window_resize(
    ctx: Arc<BridgeContext>,
    params: Value,
) -> Result<Value, AutomationError> {
    let args: WindowResizeArgs = parse_args(params)?;
    require_app(&args.app)?;

    ctx.desktop()
        .resize_window(&args.app, args.width, args.height)
        .await?;

    Ok(json!({
        "status": "success",
        "action": "window_resize",
        "app": args.app,
        "size": [args.width, args.height],
    }))
}

#[derive(Debug, Deserialize)]
struct WindowAppArgs {
    #[serde(default)]
    app: String,
}

pub(super) async fn window_position(
    ctx: Arc<BridgeContext>,
    params: Value,
) -> Result<Value, AutomationError> {
    let args: WindowAppArgs = parse_args(params)?;
    require_app(&args.app)?;

    let position = ctx.desktop().window_position(&args.app).await?;

    Ok(json!({
        "status": "success",
        "action": "window_position",
        "app": args.app,
        "position": position,
    }))
}

pub(super) async fn windows_list(
    ctx: Arc<BridgeContext>,
    _params: Value,
) -> Result<Value, AutomationError> {
    let windows = ctx.desktop().list_windows().await?;

    Ok(json!({
        "status": "success",
        "action": "windows_list",
        "count": windows.len(),
        "windows": windows,
    }))
}

#[derive(Debug, Deserialize)]
struct ScrollAppArgs {
    #[serde(default)]
    app: String,
    #[serde(default = "default_scroll_amount")]
    amount: i32,
}

fn default_scroll_amount() -> i32 {
    -3
}

/// Bring the app to the foreground, give it a moment to settle, then
/// scroll. Avoids needing a screenshot just to aim the wheel.
pub(super) async fn scroll_app(
    ctx: Arc<BridgeContext>,
    params: Value,
) -> Result<Value, AutomationError> {
    let args: ScrollAppArgs = parse_args(params)?;
    require_app(&args.app)?;

    ctx.desktop().activate_app(&args.app).await?;
    tokio::time::sleep(Duration::from_millis(200)).await;
    ctx.desktop().scroll(args.amount, None).await?;

    Ok(json!({
        "status": "success",
        "action": "scroll_app",
        "app": args.app,
        "amount": args.amount,
    }))
}

#[cfg(test)]
mod tests {
    use super::super::testutil;
    use deskbridge::platforms::stub::InputEvent;
    use serde_json::json;

    #[tokio::test]
    async fn window_move_verifies_the_new_position() {
        let bridge = testutil::bridge();
        let result = super::window_move(
            bridge.ctx.clone(),
            json!({"app": "Editor", "x": 50, "y": 60}),
        )
        .await
        .unwrap();

        assert_eq!(result["status"], "success");
        assert_eq!(result["target"], json!([50, 60]));
        assert_eq!(result["before"]["x"], json!(100));
        assert_eq!(result["after"]["x"], json!(50));
        assert_eq!(result["verified"], json!(true));
    }

    #[tokio::test]
    async fn a_missing_app_name_is_rejected() {
        let bridge = testutil::bridge();
        let err = super::window_move(bridge.ctx.clone(), json!({"x": 1, "y": 2}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("App name required"));
    }

    #[tokio::test]
    async fn window_resize_reports_the_requested_size() {
        let bridge = testutil::bridge();
        let result = super::window_resize(
            bridge.ctx.clone(),
            json!({"app": "Editor", "width": 1024, "height": 768}),
        )
        .await
        .unwrap();

        assert_eq!(result["size"], json!([1024, 768]));
        let position = super::window_position(bridge.ctx.clone(), json!({"app": "Editor"}))
            .await
            .unwrap();
        assert_eq!(position["position"]["width"], json!(1024));
    }

    #[tokio::test]
    async fn unknown_windows_surface_as_not_found() {
        let bridge = testutil::bridge();
        let err = super::window_position(bridge.ctx.clone(), json!({"app": "Ghost"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Window not found: Ghost"));
    }

    #[tokio::test]
    async fn windows_list_counts_the_open_windows() {
        let bridge = testutil::bridge();
        let result = super::windows_list(bridge.ctx.clone(), json!({})).await.unwrap();

        assert_eq!(result["status"], "success");
        assert_eq!(result["count"], json!(2));
        assert!(result["windows"]
            .as_array()
            .unwrap()
            .iter()
            .any(|w| w == "Editor"));
    }

    #[tokio::test]
    async fn scroll_app_activates_then_scrolls() {
        let bridge = testutil::bridge();
        let result = super::scroll_app(
            bridge.ctx.clone(),
            json!({"app": "Terminal", "amount": -5}),
        )
        .await
        .unwrap();

        assert_eq!(result["amount"], json!(-5));
        let events = bridge.input.events();
        assert_eq!(
            events.last(),
            Some(&InputEvent::Scroll {
                amount: -5,
                at: None
            })
        );
    }
}
