//! Pointer actions. Coordinates arrive in screenshot space when the
//! `screenshot_coords` flag is set and are converted through the capture
//! service's current scale ratio; both the input and converted points are
//! echoed back for auditing.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use deskbridge::{AutomationError, MouseButton};

use super::{parse_args, BridgeContext};

/// Bounded motion time; non-finite input means "instant".
fn motion(duration: f64) -> Duration {
    if duration.is_finite() {
        Duration::from_secs_f64(duration.clamp(0.0, 60.0))
    } else {
        Duration::ZERO
    }
}

fn default_button() -> String {
    "left".to_string()
}

#[derive(Debug, Deserialize)]
struct ClickArgs {
    #[serde(default)]
    x: i32,
    #[serde(default)]
    y: i32,
    #[serde(default = "default_button")]
    button: String,
    #[serde(default = "default_clicks")]
    clicks: u32,
    #[serde(default)]
    screenshot_coords: bool,
}

fn default_clicks() -> u32 {
    1
}

pub(super) async fn click(ctx: Arc<BridgeContext>, params: Value) -> Result<Value, AutomationError> {
    let args: ClickArgs = parse_args(params)?;
    let button: MouseButton = args.button.parse()?;

    let (real_x, real_y) = if args.screenshot_coords {
        ctx.capture().to_screen(args.x, args.y)
    } else {
        (args.x, args.y)
    };

    ctx.desktop().click_at(real_x, real_y, button, args.clicks).await?;

    Ok(json!({
        "status": "success",
        "action": "click",
        "input_coords": [args.x, args.y],
        "real_coords": [real_x, real_y],
        "screenshot_coords": args.screenshot_coords,
        "scale_ratio": ctx.capture().scale_ratio(),
    }))
}

#[derive(Debug, Deserialize)]
struct MoveArgs {
    #[serde(default)]
    x: i32,
    #[serde(default)]
    y: i32,
    #[serde(default = "default_move_duration")]
    duration: f64,
    #[serde(default)]
    screenshot_coords: bool,
}

fn default_move_duration() -> f64 {
    0.2
}

pub(super) async fn move_pointer(
    ctx: Arc<BridgeContext>,
    params: Value,
) -> Result<Value, AutomationError> {
    let args: MoveArgs = parse_args(params)?;

    let (real_x, real_y) = if args.screenshot_coords {
        ctx.capture().to_screen(args.x, args.y)
    } else {
        (args.x, args.y)
    };

    ctx.desktop()
        .move_pointer(real_x, real_y, motion(args.duration))
        .await?;

    Ok(json!({
        "status": "success",
        "action": "move",
        "input_coords": [args.x, args.y],
        "real_coords": [real_x, real_y],
        "screenshot_coords": args.screenshot_coords,
    }))
}

#[derive(Debug, Deserialize)]
struct ScrollArgs {
    #[serde(default = "default_scroll_amount")]
    amount: i32,
    x: Option<i32>,
    y: Option<i32>,
    #[serde(default)]
    screenshot_coords: bool,
}

fn default_scroll_amount() -> i32 {
    -3
}

pub(super) async fn scroll(ctx: Arc<BridgeContext>, params: Value) -> Result<Value, AutomationError> {
    let args: ScrollArgs = parse_args(params)?;

    // Position is optional; conversion applies only when both coordinates
    // came with the command.
    let at = match (args.x, args.y) {
        (Some(x), Some(y)) if args.screenshot_coords => Some(ctx.capture().to_screen(x, y)),
        (Some(x), Some(y)) => Some((x, y)),
        _ => None,
    };

    ctx.desktop().scroll(args.amount, at).await?;

    Ok(json!({
        "status": "success",
        "action": "scroll",
        "amount": args.amount,
    }))
}

pub(super) async fn position(
    ctx: Arc<BridgeContext>,
    _params: Value,
) -> Result<Value, AutomationError> {
    let (x, y) = ctx.desktop().pointer_position().await?;
    Ok(json!({"status": "success", "x": x, "y": y}))
}

#[derive(Debug, Deserialize)]
struct DragArgs {
    #[serde(default)]
    start_x: i32,
    #[serde(default)]
    start_y: i32,
    #[serde(default)]
    end_x: i32,
    #[serde(default)]
    end_y: i32,
    #[serde(default = "default_drag_duration")]
    duration: f64,
    #[serde(default = "default_button")]
    button: String,
    #[serde(default)]
    screenshot_coords: bool,
}

fn default_drag_duration() -> f64 {
    0.5
}

pub(super) async fn drag(ctx: Arc<BridgeContext>, params: Value) -> Result<Value, AutomationError> {
    let args: DragArgs = parse_args(params)?;
    let button: MouseButton = args.button.parse()?;

    let (real_from, real_to) = if args.screenshot_coords {
        (
            ctx.capture().to_screen(args.start_x, args.start_y),
            ctx.capture().to_screen(args.end_x, args.end_y),
        )
    } else {
        (
            (args.start_x, args.start_y),
            (args.end_x, args.end_y),
        )
    };

    ctx.desktop()
        .drag(real_from, real_to, motion(args.duration), button)
        .await?;

    Ok(json!({
        "status": "success",
        "action": "drag",
        "input_from": [args.start_x, args.start_y],
        "input_to": [args.end_x, args.end_y],
        "real_from": [real_from.0, real_from.1],
        "real_to": [real_to.0, real_to.1],
        "screenshot_coords": args.screenshot_coords,
    }))
}

#[cfg(test)]
mod tests {
    use super::super::testutil;
    use deskbridge::platforms::stub::InputEvent;
    use deskbridge::MouseButton;
    use serde_json::json;

    #[tokio::test]
    async fn click_passes_coordinates_through_without_the_flag() {
        let bridge = testutil::bridge();
        let result = super::click(bridge.ctx.clone(), json!({"x": 500, "y": 300}))
            .await
            .unwrap();

        assert_eq!(result["status"], "success");
        assert_eq!(result["input_coords"], json!([500, 300]));
        assert_eq!(result["real_coords"], json!([500, 300]));
        assert_eq!(result["screenshot_coords"], json!(false));
        assert!(matches!(
            bridge.input.events().last(),
            Some(InputEvent::Click {
                x: 500,
                y: 300,
                button: MouseButton::Left,
                clicks: 1
            })
        ));
    }

    #[tokio::test]
    async fn click_converts_screenshot_coordinates_after_a_capture() {
        // A 2000px frame downsizes to 1000px, so the ratio is exactly 2.
        let bridge = testutil::bridge_with_screen((2000, 1200));
        bridge.ctx.capture().full().unwrap();

        let result = super::click(
            bridge.ctx.clone(),
            json!({"x": 500, "y": 300, "screenshot_coords": true}),
        )
        .await
        .unwrap();

        assert_eq!(result["real_coords"], json!([1000, 600]));
        assert_eq!(result["scale_ratio"], json!(2.0));
        assert_eq!(result["screenshot_coords"], json!(true));
    }

    #[tokio::test]
    async fn unknown_buttons_are_rejected() {
        let bridge = testutil::bridge();
        let err = super::click(bridge.ctx.clone(), json!({"button": "fourth"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown mouse button: fourth"));
    }

    #[tokio::test]
    async fn move_reports_both_coordinate_spaces() {
        let bridge = testutil::bridge_with_screen((2000, 1200));
        bridge.ctx.capture().full().unwrap();

        let result = super::move_pointer(
            bridge.ctx.clone(),
            json!({"x": 10, "y": 20, "duration": 0, "screenshot_coords": true}),
        )
        .await
        .unwrap();

        assert_eq!(result["action"], "move");
        assert_eq!(result["input_coords"], json!([10, 20]));
        assert_eq!(result["real_coords"], json!([20, 40]));
        assert!(result.get("scale_ratio").is_none());
    }

    #[tokio::test]
    async fn scroll_defaults_and_optional_position() {
        let bridge = testutil::bridge();
        let result = super::scroll(bridge.ctx.clone(), json!({})).await.unwrap();
        assert_eq!(result["amount"], json!(-3));
        assert!(matches!(
            bridge.input.events().last(),
            Some(InputEvent::Scroll { amount: -3, at: None })
        ));

        super::scroll(bridge.ctx.clone(), json!({"amount": 5, "x": 40, "y": 60}))
            .await
            .unwrap();
        assert!(matches!(
            bridge.input.events().last(),
            Some(InputEvent::Scroll {
                amount: 5,
                at: Some((40, 60))
            })
        ));
    }

    #[tokio::test]
    async fn drag_echoes_input_and_real_endpoints() {
        let bridge = testutil::bridge_with_screen((2000, 1200));
        bridge.ctx.capture().full().unwrap();

        let result = super::drag(
            bridge.ctx.clone(),
            json!({
                "start_x": 100, "start_y": 100,
                "end_x": 200, "end_y": 150,
                "duration": 0,
                "screenshot_coords": true,
            }),
        )
        .await
        .unwrap();

        assert_eq!(result["input_from"], json!([100, 100]));
        assert_eq!(result["real_from"], json!([200, 200]));
        assert_eq!(result["real_to"], json!([400, 300]));
    }

    #[tokio::test]
    async fn position_reports_the_pointer_without_an_action_key() {
        let bridge = testutil::bridge();
        super::move_pointer(bridge.ctx.clone(), json!({"x": 7, "y": 9, "duration": 0}))
            .await
            .unwrap();

        let result = super::position(bridge.ctx.clone(), json!({})).await.unwrap();
        assert_eq!(result["x"], json!(7));
        assert_eq!(result["y"], json!(9));
        assert!(result.get("action").is_none());
    }
}
