//! Keyboard actions.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use deskbridge::AutomationError;

use super::{parse_args, BridgeContext};

#[derive(Debug, Deserialize)]
struct TypeArgs {
    #[serde(default)]
    text: String,
}

/// Clipboard-assisted typing; survives any Unicode the target accepts.
pub(super) async fn type_text(
    ctx: Arc<BridgeContext>,
    params: Value,
) -> Result<Value, AutomationError> {
    let args: TypeArgs = parse_args(params)?;
    ctx.desktop().type_with_clipboard(&args.text).await?;
    Ok(json!({
        "status": "success",
        "action": "type",
        "length": args.text.chars().count(),
        "method": "clipboard",
    }))
}

#[derive(Debug, Deserialize)]
struct TypeRawArgs {
    #[serde(default)]
    text: String,
    #[serde(default = "default_interval")]
    interval: f64,
}

fn default_interval() -> f64 {
    0.02
}

/// Per-character injection. ASCII-safe and pacing-controllable, but slower
/// than the clipboard route.
pub(super) async fn type_raw(
    ctx: Arc<BridgeContext>,
    params: Value,
) -> Result<Value, AutomationError> {
    let args: TypeRawArgs = parse_args(params)?;
    let interval = if args.interval.is_finite() {
        Duration::from_secs_f64(args.interval.clamp(0.0, 1.0))
    } else {
        Duration::ZERO
    };
    ctx.desktop().write_text(&args.text, interval).await?;
    Ok(json!({
        "status": "success",
        "action": "type_raw",
        "length": args.text.chars().count(),
        "method": "direct",
    }))
}

#[derive(Debug, Deserialize)]
struct KeyArgs {
    #[serde(default)]
    key: String,
}

/// `cmd` means the platform's primary modifier, so chords written for
/// macOS keep working elsewhere.
fn normalize_modifier(part: &str) -> String {
    let part = part.trim().to_lowercase();
    match part.as_str() {
        "cmd" | "command" => {
            if cfg!(target_os = "macos") {
                "cmd".to_string()
            } else {
                "ctrl".to_string()
            }
        }
        _ => part,
    }
}

/// Press a single key, or a `+`-separated chord as a hotkey.
pub(super) async fn key(ctx: Arc<BridgeContext>, params: Value) -> Result<Value, AutomationError> {
    let args: KeyArgs = parse_args(params)?;

    if args.key.contains('+') {
        let chord: Vec<String> = args.key.split('+').map(normalize_modifier).collect();
        ctx.desktop().hotkey(&chord).await?;
    } else {
        ctx.desktop().press_key(&args.key).await?;
    }

    Ok(json!({
        "status": "success",
        "action": "key",
        "key": args.key,
    }))
}

#[cfg(test)]
mod tests {
    use super::super::testutil;
    use deskbridge::platforms::stub::InputEvent;
    use serde_json::json;

    #[tokio::test]
    async fn type_uses_the_clipboard_and_paste_chord() {
        let bridge = testutil::bridge();
        let result = super::type_text(bridge.ctx.clone(), json!({"text": "merhaba dünya"}))
            .await
            .unwrap();

        assert_eq!(result["method"], "clipboard");
        assert_eq!(result["length"], json!(13));
        assert_eq!(bridge.clipboard.contents().as_deref(), Some("merhaba dünya"));
        assert!(matches!(
            bridge.input.events().last(),
            Some(InputEvent::Hotkey { .. })
        ));
    }

    #[tokio::test]
    async fn type_raw_writes_directly() {
        let bridge = testutil::bridge();
        let result = super::type_raw(bridge.ctx.clone(), json!({"text": "ls -la", "interval": 0}))
            .await
            .unwrap();

        assert_eq!(result["method"], "direct");
        let events = bridge.input.events();
        assert_eq!(
            events.last(),
            Some(&InputEvent::Write {
                text: "ls -la".to_string()
            })
        );
    }

    #[tokio::test]
    async fn chords_are_split_and_normalized() {
        let bridge = testutil::bridge();
        let result = super::key(bridge.ctx.clone(), json!({"key": "cmd+Shift+p"}))
            .await
            .unwrap();

        assert_eq!(result["key"], "cmd+Shift+p");
        let expected_modifier = if cfg!(target_os = "macos") { "cmd" } else { "ctrl" };
        let events = bridge.input.events();
        assert_eq!(
            events.last(),
            Some(&InputEvent::Hotkey {
                keys: vec![
                    expected_modifier.to_string(),
                    "shift".to_string(),
                    "p".to_string()
                ]
            })
        );
    }

    #[tokio::test]
    async fn single_keys_are_pressed() {
        let bridge = testutil::bridge();
        super::key(bridge.ctx.clone(), json!({"key": "enter"}))
            .await
            .unwrap();

        let events = bridge.input.events();
        assert_eq!(
            events.last(),
            Some(&InputEvent::Press {
                key: "enter".to_string()
            })
        );
    }
}
