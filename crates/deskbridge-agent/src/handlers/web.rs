//! Browser automation handlers.
//!
//! One session at a time lives in the context's driver slot. `web_open`
//! fills it, `web_close` drains it, and everything else borrows it.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::DynamicImage;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use deskbridge::{
    AutomationError, ScrollDirection, ScrollRequest, Selector, JPEG_QUALITY, MAX_WIDTH,
};

use super::{parse_args, BridgeContext};

fn default_by() -> String {
    "css".to_string()
}

fn default_true() -> bool {
    true
}

fn require_selector(selector: &str, by: &str) -> Result<Selector, AutomationError> {
    if selector.is_empty() {
        return Err(AutomationError::InvalidInput("selector required".to_string()));
    }
    Ok(Selector::new(by, selector))
}

fn clip(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

/// Wait budget from the wire. Nonpositive or non-finite means no wait.
fn wait_budget(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f64(secs.min(300.0))
    } else {
        Duration::ZERO
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[derive(Debug, Deserialize)]
struct OpenArgs {
    #[serde(default)]
    url: String,
    #[serde(default)]
    headless: Option<bool>,
}

/// Open a browser session, or reuse the live one. The slot is filled
/// before any navigation so a failed first load still leaves a session
/// behind for the next command.
pub(super) async fn open(ctx: Arc<BridgeContext>, params: Value) -> Result<Value, AutomationError> {
    let args: OpenArgs = parse_args(params)?;
    let mut session = ctx.web_session().await;

    if let Some(driver) = session.as_ref() {
        if !args.url.is_empty() {
            driver.goto(&args.url).await?;
        }
        let url = driver.current_url().await?;
        return Ok(json!({
            "status": "success",
            "message": "Session already open",
            "url": url,
        }));
    }

    let headless = args.headless.unwrap_or_else(|| ctx.headless_default());
    let driver = ctx.launcher.launch(headless).await?;
    *session = Some(Arc::clone(&driver));

    let mut result = json!({"status": "success", "message": "Browser opened"});
    if !args.url.is_empty() {
        driver.goto(&args.url).await?;
        result["url"] = json!(args.url);
    }
    Ok(result)
}

pub(super) async fn close(
    ctx: Arc<BridgeContext>,
    _params: Value,
) -> Result<Value, AutomationError> {
    let taken = ctx.web_session().await.take();
    match taken {
        Some(driver) => {
            if let Err(e) = driver.close().await {
                warn!(error = %e, "browser close failed");
            }
            Ok(json!({"status": "success", "message": "Browser closed"}))
        }
        None => Ok(json!({"status": "success", "message": "No browser to close"})),
    }
}

#[derive(Debug, Deserialize)]
struct GotoArgs {
    #[serde(default)]
    url: String,
}

pub(super) async fn goto(ctx: Arc<BridgeContext>, params: Value) -> Result<Value, AutomationError> {
    let args: GotoArgs = parse_args(params)?;
    if args.url.is_empty() {
        return Err(AutomationError::InvalidInput("url required".to_string()));
    }
    let driver = ctx.driver().await?;
    driver.goto(&args.url).await?;
    Ok(json!({
        "status": "success",
        "action": "web_goto",
        "url": args.url,
        "title": driver.title().await?,
    }))
}

#[derive(Debug, Deserialize)]
struct SelectorArgs {
    #[serde(default)]
    selector: String,
    #[serde(default = "default_by")]
    by: String,
}

pub(super) async fn find(ctx: Arc<BridgeContext>, params: Value) -> Result<Value, AutomationError> {
    let args: SelectorArgs = parse_args(params)?;
    let selector = require_selector(&args.selector, &args.by)?;
    let driver = ctx.driver().await?;

    match driver.find(&selector).await? {
        Some(element) => Ok(json!({
            "status": "success",
            "action": "web_find",
            "found": true,
            "selector": args.selector,
            "by": args.by,
            "tag": element.tag,
            "text": clip(&element.text, 200),
            "visible": element.visible,
            "enabled": element.enabled,
            "location": {"x": element.location.x, "y": element.location.y},
            "size": {"width": element.size.w, "height": element.size.h},
        })),
        None => Ok(json!({
            "status": "success",
            "action": "web_find",
            "found": false,
            "selector": args.selector,
            "by": args.by,
        })),
    }
}

pub(super) async fn click(
    ctx: Arc<BridgeContext>,
    params: Value,
) -> Result<Value, AutomationError> {
    let args: SelectorArgs = parse_args(params)?;
    let selector = require_selector(&args.selector, &args.by)?;
    let driver = ctx.driver().await?;

    let element = driver.find(&selector).await?.ok_or_else(|| {
        AutomationError::NotFound(format!("Element not found: {}", args.selector))
    })?;
    driver.click(&selector).await?;

    Ok(json!({
        "status": "success",
        "action": "web_click",
        "selector": args.selector,
        "by": args.by,
        "tag": element.tag,
    }))
}

#[derive(Debug, Deserialize)]
struct TypeArgs {
    #[serde(default)]
    selector: String,
    #[serde(default = "default_by")]
    by: String,
    #[serde(default)]
    text: String,
    #[serde(default = "default_true")]
    clear: bool,
}

pub(super) async fn type_text(
    ctx: Arc<BridgeContext>,
    params: Value,
) -> Result<Value, AutomationError> {
    let args: TypeArgs = parse_args(params)?;
    let selector = require_selector(&args.selector, &args.by)?;
    let driver = ctx.driver().await?;

    driver.type_text(&selector, &args.text, args.clear).await?;

    Ok(json!({
        "status": "success",
        "action": "web_type",
        "selector": args.selector,
        "by": args.by,
        "length": args.text.chars().count(),
    }))
}

pub(super) async fn text(ctx: Arc<BridgeContext>, params: Value) -> Result<Value, AutomationError> {
    let args: SelectorArgs = parse_args(params)?;
    let selector = require_selector(&args.selector, &args.by)?;
    let driver = ctx.driver().await?;

    let element = driver.text_of(&selector).await?;
    Ok(json!({
        "status": "success",
        "action": "web_text",
        "selector": args.selector,
        "by": args.by,
        "text": element.text,
        "tag": element.tag,
    }))
}

#[derive(Debug, Deserialize)]
struct ExistsArgs {
    #[serde(default)]
    selector: String,
    #[serde(default = "default_by")]
    by: String,
    #[serde(default)]
    timeout: f64,
}

/// Presence check. With a timeout this waits for the element; without
/// one it reports the current match count.
pub(super) async fn exists(
    ctx: Arc<BridgeContext>,
    params: Value,
) -> Result<Value, AutomationError> {
    let args: ExistsArgs = parse_args(params)?;
    let selector = require_selector(&args.selector, &args.by)?;
    let driver = ctx.driver().await?;

    if args.timeout > 0.0 {
        if driver
            .wait_for(&selector, wait_budget(args.timeout), false)
            .await?
        {
            Ok(json!({
                "status": "success",
                "action": "web_exists",
                "exists": true,
                "selector": args.selector,
            }))
        } else {
            Ok(json!({
                "status": "success",
                "action": "web_exists",
                "exists": false,
                "selector": args.selector,
                "timeout": true,
            }))
        }
    } else {
        let count = driver.count(&selector).await?;
        Ok(json!({
            "status": "success",
            "action": "web_exists",
            "exists": count > 0,
            "selector": args.selector,
            "count": count,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct WaitArgs {
    #[serde(default)]
    selector: String,
    #[serde(default = "default_by")]
    by: String,
    #[serde(default = "default_wait_timeout")]
    timeout: f64,
    #[serde(default = "default_true")]
    visible: bool,
}

fn default_wait_timeout() -> f64 {
    10.0
}

pub(super) async fn wait(ctx: Arc<BridgeContext>, params: Value) -> Result<Value, AutomationError> {
    let args: WaitArgs = parse_args(params)?;
    let selector = require_selector(&args.selector, &args.by)?;
    let driver = ctx.driver().await?;

    let appeared = driver
        .wait_for(&selector, wait_budget(args.timeout), args.visible)
        .await?;
    if !appeared {
        return Ok(json!({
            "status": "error",
            "message": format!("Timeout waiting for: {}", args.selector),
        }));
    }

    let tag = driver
        .find(&selector)
        .await?
        .map(|el| el.tag)
        .unwrap_or_default();
    Ok(json!({
        "status": "success",
        "action": "web_wait",
        "selector": args.selector,
        "by": args.by,
        "found": true,
        "tag": tag,
    }))
}

#[derive(Debug, Deserialize)]
struct WebShotArgs {
    #[serde(default = "default_filename")]
    filename: String,
}

fn default_filename() -> String {
    "web_screenshot.jpg".to_string()
}

/// Viewport screenshot, downsized and re-encoded as JPEG next to the
/// desktop captures. Page pixels never pass through the screen scale
/// state, so this does not disturb coordinate conversion.
pub(super) async fn screenshot(
    ctx: Arc<BridgeContext>,
    params: Value,
) -> Result<Value, AutomationError> {
    let args: WebShotArgs = parse_args(params)?;
    let filename = match args.filename.strip_suffix(".png") {
        Some(stem) => format!("{stem}.jpg"),
        None => args.filename,
    };

    let driver = ctx.driver().await?;
    let png = driver.screenshot_png().await?;
    let img = image::load_from_memory(&png)
        .map_err(|e| AutomationError::ParseError(format!("Bad screenshot data: {e}")))?
        .to_rgba8();
    let (original_w, original_h) = img.dimensions();

    let resized = if original_w > MAX_WIDTH {
        let new_h = ((original_h as f64) * (MAX_WIDTH as f64 / original_w as f64)) as u32;
        imageops::resize(&img, MAX_WIDTH, new_h.max(1), FilterType::Lanczos3)
    } else {
        img
    };
    let (resized_w, resized_h) = resized.dimensions();

    let rgb = DynamicImage::ImageRgba8(resized).to_rgb8();
    let path = ctx.capture().dir().join(&filename);
    let file = std::fs::File::create(&path).map_err(|e| {
        AutomationError::ExternalFailure(format!("Failed to create {}: {e}", path.display()))
    })?;
    let mut writer = std::io::BufWriter::new(file);
    let mut encoder = JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);
    encoder
        .encode_image(&rgb)
        .map_err(|e| AutomationError::ExternalFailure(format!("JPEG encode failed: {e}")))?;
    writer.flush().map_err(|e| {
        AutomationError::ExternalFailure(format!("Failed to flush {}: {e}", path.display()))
    })?;

    let size = std::fs::metadata(&path)
        .map_err(|e| {
            AutomationError::ExternalFailure(format!("Failed to stat {}: {e}", path.display()))
        })?
        .len();

    Ok(json!({
        "status": "success",
        "action": "web_screenshot",
        "path": path.display().to_string(),
        "size_kb": round1(size as f64 / 1024.0),
        "original_size": [original_w, original_h],
        "resized_size": [resized_w, resized_h],
        "url": driver.current_url().await?,
    }))
}

pub(super) async fn source(
    ctx: Arc<BridgeContext>,
    _params: Value,
) -> Result<Value, AutomationError> {
    let driver = ctx.driver().await?;
    let html = driver.page_source().await?;
    Ok(json!({
        "status": "success",
        "action": "web_source",
        "url": driver.current_url().await?,
        "title": driver.title().await?,
        "length": html.chars().count(),
        "html": clip(&html, 50_000),
    }))
}

#[derive(Debug, Deserialize)]
struct ElementsArgs {
    #[serde(default)]
    selector: String,
    #[serde(default = "default_by")]
    by: String,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    50
}

pub(super) async fn elements(
    ctx: Arc<BridgeContext>,
    params: Value,
) -> Result<Value, AutomationError> {
    let args: ElementsArgs = parse_args(params)?;
    let selector = require_selector(&args.selector, &args.by)?;
    let driver = ctx.driver().await?;

    let found = driver.list_elements(&selector, args.limit).await?;
    let listed: Vec<Value> = found
        .iter()
        .enumerate()
        .map(|(index, el)| {
            json!({
                "index": index,
                "tag": el.tag,
                "text": clip(&el.text, 100),
                "visible": el.visible,
                "location": {"x": el.location.x, "y": el.location.y},
            })
        })
        .collect();

    Ok(json!({
        "status": "success",
        "action": "web_elements",
        "selector": args.selector,
        "by": args.by,
        "count": listed.len(),
        "elements": listed,
    }))
}

#[derive(Debug, Deserialize)]
struct ExecuteArgs {
    #[serde(default)]
    script: String,
}

pub(super) async fn execute(
    ctx: Arc<BridgeContext>,
    params: Value,
) -> Result<Value, AutomationError> {
    let args: ExecuteArgs = parse_args(params)?;
    if args.script.is_empty() {
        return Err(AutomationError::InvalidInput("script required".to_string()));
    }
    let driver = ctx.driver().await?;
    let value = driver.execute(&args.script).await?;

    // Strings and null pass through untouched; everything else is
    // rendered as text so the consumer never has to guess the type.
    let rendered = match value {
        Value::Null => Value::Null,
        Value::String(s) => Value::String(s),
        other => Value::String(other.to_string()),
    };
    Ok(json!({
        "status": "success",
        "action": "web_execute",
        "result": rendered,
    }))
}

pub(super) async fn info(
    ctx: Arc<BridgeContext>,
    _params: Value,
) -> Result<Value, AutomationError> {
    let driver = ctx.driver().await?;
    Ok(json!({
        "status": "success",
        "action": "web_info",
        "url": driver.current_url().await?,
        "title": driver.title().await?,
        "session_open": true,
    }))
}

#[derive(Debug, Deserialize)]
struct WebScrollArgs {
    #[serde(default = "default_direction")]
    direction: String,
    #[serde(default = "default_scroll_amount")]
    amount: i32,
    #[serde(default)]
    selector: String,
    #[serde(default = "default_by")]
    by: String,
}

fn default_direction() -> String {
    "down".to_string()
}

fn default_scroll_amount() -> i32 {
    500
}

/// Scroll towards an element when a selector is given, otherwise along
/// the viewport.
pub(super) async fn scroll(
    ctx: Arc<BridgeContext>,
    params: Value,
) -> Result<Value, AutomationError> {
    let args: WebScrollArgs = parse_args(params)?;
    let driver = ctx.driver().await?;

    if !args.selector.is_empty() {
        let request = ScrollRequest::ToElement(Selector::new(&args.by, args.selector.clone()));
        driver.scroll(&request).await?;
        return Ok(json!({
            "status": "success",
            "action": "web_scroll",
            "to_element": args.selector,
        }));
    }

    let direction = ScrollDirection::parse(&args.direction)?;
    driver
        .scroll(&ScrollRequest::By {
            direction,
            amount: args.amount,
        })
        .await?;
    Ok(json!({
        "status": "success",
        "action": "web_scroll",
        "direction": args.direction,
        "amount": args.amount,
    }))
}

#[cfg(test)]
mod tests {
    use super::super::testutil;
    use serde_json::json;

    #[tokio::test]
    async fn open_reuses_the_live_session() {
        let bridge = testutil::bridge();
        let first = super::open(
            bridge.ctx.clone(),
            json!({"url": "https://example.com", "headless": true}),
        )
        .await
        .unwrap();
        assert_eq!(first["message"], "Browser opened");
        assert_eq!(first["url"], "https://example.com");

        let second = super::open(bridge.ctx.clone(), json!({})).await.unwrap();
        assert_eq!(second["message"], "Session already open");
        assert_eq!(second["url"], "https://example.com");
    }

    #[tokio::test]
    async fn close_reports_whether_a_session_existed() {
        let bridge = testutil::bridge();
        super::open(bridge.ctx.clone(), json!({})).await.unwrap();

        let closed = super::close(bridge.ctx.clone(), json!({})).await.unwrap();
        assert_eq!(closed["message"], "Browser closed");

        let again = super::close(bridge.ctx.clone(), json!({})).await.unwrap();
        assert_eq!(again["message"], "No browser to close");
    }

    #[tokio::test]
    async fn actions_without_a_session_are_rejected() {
        let bridge = testutil::bridge();
        let err = super::goto(bridge.ctx.clone(), json!({"url": "https://example.com"}))
            .await
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("No browser session. Use web_open first."));
    }

    #[tokio::test]
    async fn find_reports_metadata_or_absence() {
        let bridge = testutil::bridge();
        super::open(bridge.ctx.clone(), json!({})).await.unwrap();

        let found = super::find(bridge.ctx.clone(), json!({"selector": "#login"}))
            .await
            .unwrap();
        assert_eq!(found["found"], json!(true));
        assert_eq!(found["tag"], "button");
        assert_eq!(found["enabled"], json!(true));
        assert_eq!(found["size"], json!({"width": 120, "height": 32}));

        let missing = super::find(bridge.ctx.clone(), json!({"selector": "#nope"}))
            .await
            .unwrap();
        assert_eq!(missing["status"], "success");
        assert_eq!(missing["found"], json!(false));
    }

    #[tokio::test]
    async fn click_requires_a_matching_element() {
        let bridge = testutil::bridge();
        super::open(bridge.ctx.clone(), json!({})).await.unwrap();

        let clicked = super::click(bridge.ctx.clone(), json!({"selector": "#login"}))
            .await
            .unwrap();
        assert_eq!(clicked["tag"], "button");

        let err = super::click(bridge.ctx.clone(), json!({"selector": "#nope"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Element not found: #nope"));
    }

    #[tokio::test]
    async fn type_reports_the_character_count() {
        let bridge = testutil::bridge();
        super::open(bridge.ctx.clone(), json!({})).await.unwrap();

        let typed = super::type_text(
            bridge.ctx.clone(),
            json!({"selector": "#login", "text": "gizli şifre"}),
        )
        .await
        .unwrap();
        assert_eq!(typed["length"], json!(11));

        let err = super::type_text(bridge.ctx.clone(), json!({"text": "x"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("selector required"));
    }

    #[tokio::test]
    async fn exists_counts_matches_immediately() {
        let bridge = testutil::bridge();
        super::open(bridge.ctx.clone(), json!({})).await.unwrap();

        let present = super::exists(bridge.ctx.clone(), json!({"selector": "#login"}))
            .await
            .unwrap();
        assert_eq!(present["exists"], json!(true));
        assert_eq!(present["count"], json!(1));

        let absent = super::exists(bridge.ctx.clone(), json!({"selector": "#nope"}))
            .await
            .unwrap();
        assert_eq!(absent["exists"], json!(false));
        assert_eq!(absent["count"], json!(0));
    }

    #[tokio::test]
    async fn wait_expiry_is_an_error_payload() {
        let bridge = testutil::bridge();
        super::open(bridge.ctx.clone(), json!({})).await.unwrap();

        let result = super::wait(
            bridge.ctx.clone(),
            json!({"selector": "#nope", "timeout": 0.2}),
        )
        .await
        .unwrap();
        assert_eq!(result["status"], "error");
        assert_eq!(result["message"], "Timeout waiting for: #nope");

        let found = super::wait(bridge.ctx.clone(), json!({"selector": "#login"}))
            .await
            .unwrap();
        assert_eq!(found["found"], json!(true));
        assert_eq!(found["tag"], "button");
    }

    #[tokio::test]
    async fn screenshot_rewrites_png_names_and_writes_jpeg() {
        let bridge = testutil::bridge();
        super::open(bridge.ctx.clone(), json!({})).await.unwrap();

        let result = super::screenshot(bridge.ctx.clone(), json!({"filename": "page.png"}))
            .await
            .unwrap();
        let path = result["path"].as_str().unwrap();
        assert!(path.ends_with("page.jpg"));
        assert!(std::fs::metadata(path).is_ok());
        assert_eq!(result["original_size"], json!([320, 200]));
        assert_eq!(result["resized_size"], json!([320, 200]));
        assert!(result["size_kb"].as_f64().unwrap() > 0.0);
    }

    #[tokio::test]
    async fn execute_passes_strings_through() {
        let bridge = testutil::bridge();
        super::open(bridge.ctx.clone(), json!({})).await.unwrap();

        let result = super::execute(bridge.ctx.clone(), json!({"script": "return 1"}))
            .await
            .unwrap();
        assert_eq!(result["result"], "ok");

        let err = super::execute(bridge.ctx.clone(), json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("script required"));
    }

    #[tokio::test]
    async fn scroll_routes_by_selector_or_direction() {
        let bridge = testutil::bridge();
        super::open(bridge.ctx.clone(), json!({})).await.unwrap();

        let to_element = super::scroll(bridge.ctx.clone(), json!({"selector": "#login"}))
            .await
            .unwrap();
        assert_eq!(to_element["to_element"], "#login");

        let by_direction = super::scroll(bridge.ctx.clone(), json!({"direction": "bottom"}))
            .await
            .unwrap();
        assert_eq!(by_direction["direction"], "bottom");

        let err = super::scroll(bridge.ctx.clone(), json!({"direction": "sideways"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown scroll direction: sideways"));
    }

    #[tokio::test]
    async fn source_and_info_describe_the_page() {
        let bridge = testutil::bridge();
        super::open(bridge.ctx.clone(), json!({"url": "https://example.com"}))
            .await
            .unwrap();

        let source = super::source(bridge.ctx.clone(), json!({})).await.unwrap();
        assert_eq!(source["title"], "Stub Page");
        assert_eq!(
            source["length"].as_u64().unwrap() as usize,
            source["html"].as_str().unwrap().chars().count()
        );

        let info = super::info(bridge.ctx.clone(), json!({})).await.unwrap();
        assert_eq!(info["url"], "https://example.com");
        assert_eq!(info["session_open"], json!(true));
    }
}
