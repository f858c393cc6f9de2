//! Browser automation over the Chrome DevTools Protocol.
//!
//! [`CdpBrowser`] drives a chromiumoxide page. Selectors that CSS cannot
//! express (xpath, link text) are resolved by tagging the matched node
//! with a transient marker attribute and re-querying it, so every element
//! handle is a real DOM node usable for clicks and typing. [`StubBrowser`]
//! is an in-memory stand-in used by the stub backend set and by tests.

use crate::{AutomationError, Point, Size};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use chromiumoxide::Element;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Attribute used to hand resolved nodes from script back to CDP queries.
const MARKER_ATTR: &str = "data-deskbridge-ref";

/// Poll interval for [`BrowserDriver::wait_for`].
const WAIT_POLL: Duration = Duration::from_millis(200);

/// Selector strategy. Unknown names fall back to CSS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectBy {
    Id,
    Class,
    Css,
    XPath,
    Text,
    PartialText,
    Tag,
    Name,
}

impl SelectBy {
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "id" => Self::Id,
            "class" => Self::Class,
            "xpath" => Self::XPath,
            "text" => Self::Text,
            "partial_text" => Self::PartialText,
            "tag" => Self::Tag,
            "name" => Self::Name,
            _ => Self::Css,
        }
    }
}

/// A strategy plus the value to match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub by: SelectBy,
    pub value: String,
}

impl Selector {
    pub fn new(by: &str, value: impl Into<String>) -> Self {
        Self {
            by: SelectBy::parse(by),
            value: value.into(),
        }
    }

    pub fn css(value: impl Into<String>) -> Self {
        Self {
            by: SelectBy::Css,
            value: value.into(),
        }
    }

    /// CSS equivalent of this selector, when one exists.
    fn as_css(&self) -> Option<String> {
        let quoted = || self.value.replace('\\', "\\\\").replace('"', "\\\"");
        match self.by {
            SelectBy::Css => Some(self.value.clone()),
            SelectBy::Tag => Some(self.value.clone()),
            SelectBy::Id => Some(format!("[id=\"{}\"]", quoted())),
            SelectBy::Name => Some(format!("[name=\"{}\"]", quoted())),
            SelectBy::Class => Some(format!("[class~=\"{}\"]", quoted())),
            SelectBy::XPath | SelectBy::Text | SelectBy::PartialText => None,
        }
    }

    /// The selector value as a JSON string literal, safe to embed in script.
    fn js_literal(&self) -> String {
        Value::String(self.value.clone()).to_string()
    }
}

/// Element metadata reported back to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebElement {
    pub tag: String,
    pub text: String,
    pub visible: bool,
    pub enabled: bool,
    pub location: Point,
    pub size: Size,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
    Top,
    Bottom,
}

impl ScrollDirection {
    pub fn parse(name: &str) -> Result<Self, AutomationError> {
        match name.to_lowercase().as_str() {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "top" => Ok(Self::Top),
            "bottom" => Ok(Self::Bottom),
            other => Err(AutomationError::InvalidInput(format!(
                "Unknown scroll direction: {other}"
            ))),
        }
    }
}

/// One page scroll, either towards an element or along the viewport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrollRequest {
    ToElement(Selector),
    By {
        direction: ScrollDirection,
        amount: i32,
    },
}

/// Driver for one live browser session.
#[async_trait::async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn goto(&self, url: &str) -> Result<(), AutomationError>;

    async fn current_url(&self) -> Result<String, AutomationError>;

    async fn title(&self) -> Result<String, AutomationError>;

    /// Metadata of the first match, or `None` when nothing matches.
    async fn find(&self, selector: &Selector) -> Result<Option<WebElement>, AutomationError>;

    /// Number of nodes matching the selector.
    async fn count(&self, selector: &Selector) -> Result<usize, AutomationError>;

    /// Click the first match. `NotFound` when nothing matches.
    async fn click(&self, selector: &Selector) -> Result<(), AutomationError>;

    /// Type into the first match, optionally clearing its value first.
    async fn type_text(
        &self,
        selector: &Selector,
        text: &str,
        clear: bool,
    ) -> Result<(), AutomationError>;

    /// Metadata of the first match. `NotFound` when nothing matches.
    async fn text_of(&self, selector: &Selector) -> Result<WebElement, AutomationError>;

    /// Poll until the selector matches (and is visible when `visible` is
    /// set). Returns whether it appeared before the timeout.
    async fn wait_for(
        &self,
        selector: &Selector,
        timeout: Duration,
        visible: bool,
    ) -> Result<bool, AutomationError>;

    /// Run a script in the page. A `return` statement yields the value.
    async fn execute(&self, script: &str) -> Result<Value, AutomationError>;

    async fn scroll(&self, request: &ScrollRequest) -> Result<(), AutomationError>;

    /// PNG screenshot of the current viewport.
    async fn screenshot_png(&self) -> Result<Vec<u8>, AutomationError>;

    /// Full HTML of the current page.
    async fn page_source(&self) -> Result<String, AutomationError>;

    /// Metadata for up to `limit` matches.
    async fn list_elements(
        &self,
        selector: &Selector,
        limit: usize,
    ) -> Result<Vec<WebElement>, AutomationError>;

    /// Shut the session down. The driver is unusable afterwards.
    async fn close(&self) -> Result<(), AutomationError>;
}

/// Opens browser sessions on demand.
#[async_trait::async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(
        &self,
        headless: bool,
    ) -> Result<std::sync::Arc<dyn BrowserDriver>, AutomationError>;
}

fn cdp_err(e: impl std::fmt::Display) -> AutomationError {
    AutomationError::ExternalFailure(format!("Browser call failed: {e}"))
}

fn not_found(selector: &Selector) -> AutomationError {
    AutomationError::NotFound(format!("Element not found: {}", selector.value))
}

/// Script body that collects nodes matching a non-CSS selector into a
/// `matches` array.
fn matches_snippet(selector: &Selector) -> String {
    let value = selector.js_literal();
    match selector.by {
        SelectBy::XPath => format!(
            "var it = document.evaluate({value}, document, null, \
             XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); \
             for (var j = 0; j < it.snapshotLength; j++) {{ \
             var node = it.snapshotItem(j); \
             if (node && node.nodeType === 1) matches.push(node); }}"
        ),
        SelectBy::Text => format!(
            "var links = document.querySelectorAll('a'); \
             for (var j = 0; j < links.length; j++) {{ \
             if (links[j].textContent.trim() === {value}) matches.push(links[j]); }}"
        ),
        SelectBy::PartialText => format!(
            "var links = document.querySelectorAll('a'); \
             for (var j = 0; j < links.length; j++) {{ \
             if (links[j].textContent.indexOf({value}) !== -1) matches.push(links[j]); }}"
        ),
        // CSS-expressible strategies never reach the script path.
        _ => format!(
            "var found = document.querySelectorAll({value}); \
             for (var j = 0; j < found.length; j++) matches.push(found[j]);"
        ),
    }
}

fn mark_script(selector: &Selector, marker: &str, limit: usize) -> String {
    let fill = matches_snippet(selector);
    format!(
        "(function() {{ var matches = []; {fill} \
         var n = Math.min(matches.length, {limit}); \
         for (var i = 0; i < n; i++) {{ \
         matches[i].setAttribute('{MARKER_ATTR}', '{marker}-' + i); }} \
         return n; }})()"
    )
}

fn count_script(selector: &Selector) -> String {
    let fill = matches_snippet(selector);
    format!("(function() {{ var matches = []; {fill} return matches.length; }})()")
}

const PROBE_FN: &str = "function() { \
    var rect = this.getBoundingClientRect(); \
    return JSON.stringify({ \
        tag: this.tagName.toLowerCase(), \
        text: (this.innerText || this.textContent || '').trim(), \
        visible: !!(this.offsetWidth || this.offsetHeight || this.getClientRects().length), \
        enabled: !this.disabled, \
        x: Math.round(rect.left), \
        y: Math.round(rect.top), \
        width: Math.round(rect.width), \
        height: Math.round(rect.height) \
    }); \
}";

#[derive(Deserialize)]
struct ElementProbe {
    tag: String,
    text: String,
    visible: bool,
    enabled: bool,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

/// A chromium session owned by this process.
pub struct CdpBrowser {
    browser: tokio::sync::Mutex<Browser>,
    page: Page,
    handler_task: tokio::task::JoinHandle<()>,
    marker_seq: AtomicU64,
}

impl CdpBrowser {
    /// Launch a fresh chromium and open a blank page.
    pub async fn launch(headless: bool) -> Result<Self, AutomationError> {
        let mut builder = BrowserConfig::builder()
            .args(vec!["--window-size=1280,900"])
            .launch_timeout(Duration::from_secs(20));
        if !headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(AutomationError::ExternalFailure)?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(cdp_err)?;
        let handler_task = tokio::spawn(async move {
            while handler.next().await.is_some() {}
        });
        let page = browser.new_page("about:blank").await.map_err(cdp_err)?;
        info!(headless, "browser session started");

        Ok(Self {
            browser: tokio::sync::Mutex::new(browser),
            page,
            handler_task,
            marker_seq: AtomicU64::new(0),
        })
    }

    async fn probe(&self, element: &Element) -> Result<WebElement, AutomationError> {
        let returns = element.call_js_fn(PROBE_FN, false).await.map_err(cdp_err)?;
        let raw = returns
            .result
            .value
            .as_ref()
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AutomationError::ParseError("Element probe returned no value".to_string())
            })?;
        let probe: ElementProbe = serde_json::from_str(raw)
            .map_err(|e| AutomationError::ParseError(format!("Bad element probe: {e}")))?;
        Ok(WebElement {
            tag: probe.tag,
            text: probe.text,
            visible: probe.visible,
            enabled: probe.enabled,
            location: Point {
                x: probe.x,
                y: probe.y,
            },
            size: Size {
                w: probe.width,
                h: probe.height,
            },
        })
    }

    async fn unmark(&self, element: &Element) {
        let script = format!("function() {{ this.removeAttribute('{MARKER_ATTR}'); }}");
        let _ = element.call_js_fn(script, false).await;
    }

    /// Tag up to `limit` matches with a fresh marker and return the handles.
    async fn resolve_all(
        &self,
        selector: &Selector,
        limit: usize,
    ) -> Result<Vec<Element>, AutomationError> {
        if let Some(css) = selector.as_css() {
            let mut elements = self.page.find_elements(css).await.unwrap_or_default();
            elements.truncate(limit);
            return Ok(elements);
        }

        let marker = format!("m{}", self.marker_seq.fetch_add(1, Ordering::Relaxed));
        let marked = self
            .page
            .evaluate(mark_script(selector, &marker, limit))
            .await
            .map_err(cdp_err)?;
        let count = marked.value().and_then(Value::as_u64).unwrap_or(0) as usize;

        let mut elements = Vec::with_capacity(count);
        for i in 0..count {
            let query = format!("[{MARKER_ATTR}=\"{marker}-{i}\"]");
            let element = self.page.find_element(query).await.map_err(cdp_err)?;
            self.unmark(&element).await;
            elements.push(element);
        }
        Ok(elements)
    }

    async fn resolve(&self, selector: &Selector) -> Result<Option<Element>, AutomationError> {
        Ok(self.resolve_all(selector, 1).await?.into_iter().next())
    }
}

impl Drop for CdpBrowser {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

#[async_trait::async_trait]
impl BrowserDriver for CdpBrowser {
    async fn goto(&self, url: &str) -> Result<(), AutomationError> {
        debug!(url, "navigate");
        self.page.goto(url).await.map_err(cdp_err)?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, AutomationError> {
        Ok(self.page.url().await.map_err(cdp_err)?.unwrap_or_default())
    }

    async fn title(&self) -> Result<String, AutomationError> {
        Ok(self
            .page
            .get_title()
            .await
            .map_err(cdp_err)?
            .unwrap_or_default())
    }

    async fn find(&self, selector: &Selector) -> Result<Option<WebElement>, AutomationError> {
        match self.resolve(selector).await? {
            Some(element) => Ok(Some(self.probe(&element).await?)),
            None => Ok(None),
        }
    }

    async fn count(&self, selector: &Selector) -> Result<usize, AutomationError> {
        if let Some(css) = selector.as_css() {
            return Ok(self
                .page
                .find_elements(css)
                .await
                .map(|els| els.len())
                .unwrap_or(0));
        }
        let result = self
            .page
            .evaluate(count_script(selector))
            .await
            .map_err(cdp_err)?;
        Ok(result.value().and_then(Value::as_u64).unwrap_or(0) as usize)
    }

    async fn click(&self, selector: &Selector) -> Result<(), AutomationError> {
        let element = self
            .resolve(selector)
            .await?
            .ok_or_else(|| not_found(selector))?;
        element.click().await.map_err(cdp_err)?;
        Ok(())
    }

    async fn type_text(
        &self,
        selector: &Selector,
        text: &str,
        clear: bool,
    ) -> Result<(), AutomationError> {
        let element = self
            .resolve(selector)
            .await?
            .ok_or_else(|| not_found(selector))?;
        if clear {
            element
                .call_js_fn("function() { this.value = ''; }", false)
                .await
                .map_err(cdp_err)?;
        }
        element.focus().await.map_err(cdp_err)?;
        element.type_str(text).await.map_err(cdp_err)?;
        Ok(())
    }

    async fn text_of(&self, selector: &Selector) -> Result<WebElement, AutomationError> {
        let element = self
            .resolve(selector)
            .await?
            .ok_or_else(|| not_found(selector))?;
        self.probe(&element).await
    }

    async fn wait_for(
        &self,
        selector: &Selector,
        timeout: Duration,
        visible: bool,
    ) -> Result<bool, AutomationError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(element) = self.resolve(selector).await? {
                if !visible || self.probe(&element).await?.visible {
                    return Ok(true);
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(WAIT_POLL).await;
        }
    }

    async fn execute(&self, script: &str) -> Result<Value, AutomationError> {
        // Wrapping in a function makes `return` statements legal, matching
        // how script injection normally behaves in automation clients.
        let wrapped = format!("(function() {{ {script} }})()");
        let result = self
            .page
            .evaluate(wrapped)
            .await
            .map_err(|e| AutomationError::ExternalFailure(format!("Script failed: {e}")))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn scroll(&self, request: &ScrollRequest) -> Result<(), AutomationError> {
        match request {
            ScrollRequest::ToElement(selector) => {
                let element = self
                    .resolve(selector)
                    .await?
                    .ok_or_else(|| not_found(selector))?;
                element.scroll_into_view().await.map_err(cdp_err)?;
                Ok(())
            }
            ScrollRequest::By { direction, amount } => {
                let script = match direction {
                    ScrollDirection::Down => format!("window.scrollBy(0, {amount})"),
                    ScrollDirection::Up => format!("window.scrollBy(0, -{amount})"),
                    ScrollDirection::Top => "window.scrollTo(0, 0)".to_string(),
                    ScrollDirection::Bottom => {
                        "window.scrollTo(0, document.body.scrollHeight)".to_string()
                    }
                };
                self.page.evaluate(script).await.map_err(cdp_err)?;
                Ok(())
            }
        }
    }

    async fn screenshot_png(&self) -> Result<Vec<u8>, AutomationError> {
        self.page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .build(),
            )
            .await
            .map_err(cdp_err)
    }

    async fn page_source(&self) -> Result<String, AutomationError> {
        self.page.content().await.map_err(cdp_err)
    }

    async fn list_elements(
        &self,
        selector: &Selector,
        limit: usize,
    ) -> Result<Vec<WebElement>, AutomationError> {
        let mut collected = Vec::new();
        for element in self.resolve_all(selector, limit).await? {
            match self.probe(&element).await {
                Ok(info) => collected.push(info),
                // Nodes can go stale between resolution and probing.
                Err(e) => debug!(error = %e, "skipping unprobeable element"),
            }
        }
        Ok(collected)
    }

    async fn close(&self) -> Result<(), AutomationError> {
        let mut browser = self.browser.lock().await;
        browser.close().await.map_err(cdp_err)?;
        let _ = browser.wait().await;
        self.handler_task.abort();
        info!("browser session closed");
        Ok(())
    }
}

/// Launches real chromium sessions.
pub struct CdpLauncher;

impl CdpLauncher {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CdpLauncher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl BrowserLauncher for CdpLauncher {
    async fn launch(
        &self,
        headless: bool,
    ) -> Result<std::sync::Arc<dyn BrowserDriver>, AutomationError> {
        Ok(std::sync::Arc::new(CdpBrowser::launch(headless).await?))
    }
}

struct StubPage {
    url: String,
    title: String,
    html: String,
    elements: BTreeMap<String, WebElement>,
    typed: Vec<(String, String)>,
    closed: bool,
}

/// An in-memory browser with a fixed element table. Selectors match by
/// exact value regardless of strategy.
pub struct StubBrowser {
    state: std::sync::Mutex<StubPage>,
}

impl StubBrowser {
    pub fn new() -> Self {
        let mut elements = BTreeMap::new();
        elements.insert(
            "#login".to_string(),
            WebElement {
                tag: "button".to_string(),
                text: "Sign in".to_string(),
                visible: true,
                enabled: true,
                location: Point { x: 40, y: 300 },
                size: Size { w: 120, h: 32 },
            },
        );
        elements.insert(
            ".result".to_string(),
            WebElement {
                tag: "div".to_string(),
                text: "First result".to_string(),
                visible: true,
                enabled: true,
                location: Point { x: 120, y: 180 },
                size: Size { w: 400, h: 60 },
            },
        );
        elements.insert(
            "About".to_string(),
            WebElement {
                tag: "a".to_string(),
                text: "About".to_string(),
                visible: true,
                enabled: true,
                location: Point { x: 20, y: 40 },
                size: Size { w: 48, h: 16 },
            },
        );
        Self::with_elements(elements)
    }

    pub fn with_elements(elements: BTreeMap<String, WebElement>) -> Self {
        Self {
            state: std::sync::Mutex::new(StubPage {
                url: "about:blank".to_string(),
                title: "Stub Page".to_string(),
                html: "<html><head><title>Stub Page</title></head><body>stub</body></html>"
                    .to_string(),
                elements,
                typed: Vec::new(),
                closed: false,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StubPage> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn last_typed(&self) -> Option<(String, String)> {
        self.lock().typed.last().cloned()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

impl Default for StubBrowser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl BrowserDriver for StubBrowser {
    async fn goto(&self, url: &str) -> Result<(), AutomationError> {
        self.lock().url = url.to_string();
        Ok(())
    }

    async fn current_url(&self) -> Result<String, AutomationError> {
        Ok(self.lock().url.clone())
    }

    async fn title(&self) -> Result<String, AutomationError> {
        Ok(self.lock().title.clone())
    }

    async fn find(&self, selector: &Selector) -> Result<Option<WebElement>, AutomationError> {
        Ok(self.lock().elements.get(&selector.value).cloned())
    }

    async fn count(&self, selector: &Selector) -> Result<usize, AutomationError> {
        Ok(usize::from(self.lock().elements.contains_key(&selector.value)))
    }

    async fn click(&self, selector: &Selector) -> Result<(), AutomationError> {
        if self.lock().elements.contains_key(&selector.value) {
            Ok(())
        } else {
            Err(not_found(selector))
        }
    }

    async fn type_text(
        &self,
        selector: &Selector,
        text: &str,
        _clear: bool,
    ) -> Result<(), AutomationError> {
        let mut state = self.lock();
        if !state.elements.contains_key(&selector.value) {
            return Err(not_found(selector));
        }
        state.typed.push((selector.value.clone(), text.to_string()));
        Ok(())
    }

    async fn text_of(&self, selector: &Selector) -> Result<WebElement, AutomationError> {
        self.lock()
            .elements
            .get(&selector.value)
            .cloned()
            .ok_or_else(|| not_found(selector))
    }

    async fn wait_for(
        &self,
        selector: &Selector,
        _timeout: Duration,
        visible: bool,
    ) -> Result<bool, AutomationError> {
        Ok(self
            .lock()
            .elements
            .get(&selector.value)
            .map(|el| !visible || el.visible)
            .unwrap_or(false))
    }

    async fn execute(&self, _script: &str) -> Result<Value, AutomationError> {
        Ok(Value::String("ok".to_string()))
    }

    async fn scroll(&self, request: &ScrollRequest) -> Result<(), AutomationError> {
        if let ScrollRequest::ToElement(selector) = request {
            if !self.lock().elements.contains_key(&selector.value) {
                return Err(not_found(selector));
            }
        }
        Ok(())
    }

    async fn screenshot_png(&self) -> Result<Vec<u8>, AutomationError> {
        let img = image::RgbaImage::from_fn(320, 200, |x, y| {
            image::Rgba([(x % 256) as u8, (y % 256) as u8, 90, 255])
        });
        let mut bytes = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .map_err(|e| AutomationError::ExternalFailure(format!("Screenshot failed: {e}")))?;
        Ok(bytes)
    }

    async fn page_source(&self) -> Result<String, AutomationError> {
        Ok(self.lock().html.clone())
    }

    async fn list_elements(
        &self,
        _selector: &Selector,
        limit: usize,
    ) -> Result<Vec<WebElement>, AutomationError> {
        Ok(self.lock().elements.values().take(limit).cloned().collect())
    }

    async fn close(&self) -> Result<(), AutomationError> {
        self.lock().closed = true;
        Ok(())
    }
}

/// Hands out [`StubBrowser`] sessions for stub mode.
pub struct StubLauncher;

#[async_trait::async_trait]
impl BrowserLauncher for StubLauncher {
    async fn launch(
        &self,
        _headless: bool,
    ) -> Result<std::sync::Arc<dyn BrowserDriver>, AutomationError> {
        Ok(std::sync::Arc::new(StubBrowser::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_strategies_fall_back_to_css() {
        assert_eq!(SelectBy::parse("css"), SelectBy::Css);
        assert_eq!(SelectBy::parse("XPATH"), SelectBy::XPath);
        assert_eq!(SelectBy::parse("whatever"), SelectBy::Css);
    }

    #[test]
    fn css_translation_quotes_attribute_values() {
        let selector = Selector::new("id", "main-form");
        assert_eq!(selector.as_css().as_deref(), Some("[id=\"main-form\"]"));

        let tricky = Selector::new("name", "a\"b");
        assert_eq!(tricky.as_css().as_deref(), Some("[name=\"a\\\"b\"]"));

        assert_eq!(Selector::new("xpath", "//div").as_css(), None);
    }

    #[test]
    fn mark_script_embeds_value_as_json_literal() {
        let selector = Selector::new("text", "Don't \"click\"");
        let script = mark_script(&selector, "m0", 1);
        assert!(script.contains("\"Don't \\\"click\\\"\""));
        assert!(script.contains(MARKER_ATTR));
    }

    #[tokio::test]
    async fn stub_browser_finds_known_elements() {
        let browser = StubBrowser::new();
        let found = browser.find(&Selector::css("#login")).await.unwrap();
        assert_eq!(found.unwrap().tag, "button");

        let missing = browser.find(&Selector::css("#nope")).await.unwrap();
        assert!(missing.is_none());
        assert_eq!(browser.count(&Selector::css("#login")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn stub_browser_click_on_missing_element_is_not_found() {
        let browser = StubBrowser::new();
        let err = browser.click(&Selector::css("#nope")).await.unwrap_err();
        assert_eq!(err.to_string(), "Not found: Element not found: #nope");
    }

    #[tokio::test]
    async fn stub_browser_records_typed_text() {
        let browser = StubBrowser::new();
        browser
            .type_text(&Selector::css("#login"), "hunter2", true)
            .await
            .unwrap();
        assert_eq!(
            browser.last_typed(),
            Some(("#login".to_string(), "hunter2".to_string()))
        );
    }

    #[tokio::test]
    async fn stub_browser_screenshot_is_decodable_png() {
        let browser = StubBrowser::new();
        let bytes = browser.screenshot_png().await.unwrap();
        let img = image::load_from_memory(&bytes).unwrap();
        assert_eq!((img.width(), img.height()), (320, 200));
    }
}
