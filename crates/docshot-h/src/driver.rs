//! Headless Chromium implementation of the engine's driver traits.
//!
//! Element interactions that the CDP wrapper exposes directly (focus, typing,
//! scrolling) go through it; synthetic pointer input (clicks with a chosen
//! button, sustained hover, drag) is dispatched as raw `Input.*` commands.
//! Text queries run through an injected page helper that marks matches with a
//! data attribute, so they come back as real element handles.

use crate::cdp::{CdpClient, LaunchOptions};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType, MouseButton as CdpMouseButton,
};
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, TimeSinceEpoch};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, Viewport};
use chromiumoxide::cdp::js_protocol::runtime::CallFunctionOnReturns;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Element as CdpElement, Page};
use docshot_core::geometry::BoundingBox;
use docshot_core::protocol::{CaptureFormat, Cookie, MouseButton, StorageState};
use docshot_core::selector::{MatchMode, TextQuery};
use docshot_engine::driver::{CaptureRequest, Driver, DriverError, Element as _, Page as _};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const FIND_TEXT_JS: &str = include_str!("find_text.js");

const HIT_ATTR: &str = "data-docshot-hit";
const SCOPE_ATTR: &str = "data-docshot-scope";

const LOAD_POLL_INTERVAL: Duration = Duration::from_millis(100);
const DRAG_STEPS: usize = 5;

fn browser_err(e: impl std::fmt::Display) -> DriverError {
    DriverError::Browser(e.to_string())
}

fn invalid_expression(expression: &str, reason: impl std::fmt::Display) -> DriverError {
    DriverError::InvalidExpression {
        expression: expression.to_string(),
        reason: reason.to_string(),
    }
}

/// Extract the returned value of a `callFunctionOn`, surfacing JS exceptions.
fn js_value(returns: CallFunctionOnReturns) -> Result<serde_json::Value, DriverError> {
    if let Some(exception) = returns.exception_details {
        return Err(DriverError::Browser(format!(
            "script threw: {}",
            exception.text
        )));
    }
    Ok(returns.result.value.unwrap_or(serde_json::Value::Null))
}

fn cdp_button(button: MouseButton) -> CdpMouseButton {
    match button {
        MouseButton::Left => CdpMouseButton::Left,
        MouseButton::Middle => CdpMouseButton::Middle,
        MouseButton::Right => CdpMouseButton::Right,
    }
}

async fn dispatch_mouse(
    page: &Page,
    kind: DispatchMouseEventType,
    x: f64,
    y: f64,
    button: Option<CdpMouseButton>,
    click_count: Option<i64>,
) -> Result<(), DriverError> {
    let mut builder = DispatchMouseEventParams::builder().r#type(kind).x(x).y(y);
    if let Some(button) = button {
        builder = builder.button(button);
    }
    if let Some(count) = click_count {
        builder = builder.click_count(count);
    }
    let params = builder
        .build()
        .map_err(|e| DriverError::Browser(format!("Failed to build mouse event: {:?}", e)))?;
    page.execute(params).await.map_err(browser_err)?;
    Ok(())
}

/// Which query language a locator expression uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryKind<'a> {
    Css(&'a str),
    Xpath(&'a str),
}

/// Expressions use CSS unless they carry an `xpath=` prefix or start the way
/// only an XPath can.
fn parse_expression(expression: &str) -> QueryKind<'_> {
    if let Some(xpath) = expression.strip_prefix("xpath=") {
        QueryKind::Xpath(xpath)
    } else if expression.starts_with('/') || expression.starts_with('(') {
        QueryKind::Xpath(expression)
    } else {
        QueryKind::Css(expression)
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

pub struct HeadlessDriver {
    client: Option<CdpClient>,
}

impl HeadlessDriver {
    /// Launch the browser, optionally pre-seeding the context with cached
    /// session state.
    pub async fn launch(
        options: LaunchOptions,
        storage_state: Option<StorageState>,
    ) -> Result<Self, DriverError> {
        let client = CdpClient::launch(&options).await.map_err(browser_err)?;
        let driver = Self {
            client: Some(client),
        };
        if let Some(state) = storage_state {
            driver.seed_cookies(&state).await?;
        }
        Ok(driver)
    }

    /// The initial page of the context.
    pub fn page(&self) -> Result<HeadlessPage, DriverError> {
        let client = self.client.as_ref().ok_or(DriverError::NotReady)?;
        Ok(HeadlessPage::new(client.page.clone()))
    }

    fn client(&self) -> Result<&CdpClient, DriverError> {
        self.client.as_ref().ok_or(DriverError::NotReady)
    }

    async fn seed_cookies(&self, state: &StorageState) -> Result<(), DriverError> {
        if state.cookies.is_empty() {
            return Ok(());
        }
        let mut params = Vec::with_capacity(state.cookies.len());
        for cookie in &state.cookies {
            let mut builder = CookieParam::builder()
                .name(cookie.name.as_str())
                .value(cookie.value.as_str());
            if let Some(domain) = &cookie.domain {
                builder = builder.domain(domain.as_str());
            }
            if let Some(path) = &cookie.path {
                builder = builder.path(path.as_str());
            }
            if let Some(expires) = cookie.expires {
                builder = builder.expires(TimeSinceEpoch::new(expires));
            }
            if let Some(http_only) = cookie.http_only {
                builder = builder.http_only(http_only);
            }
            if let Some(secure) = cookie.secure {
                builder = builder.secure(secure);
            }
            params.push(
                builder
                    .build()
                    .map_err(|e| DriverError::Browser(format!("invalid cached cookie: {e}")))?,
            );
        }
        let client = self.client()?;
        client.page.set_cookies(params).await.map_err(browser_err)?;
        tracing::info!(cookies = state.cookies.len(), "seeded cached session state");
        Ok(())
    }
}

#[async_trait]
impl Driver for HeadlessDriver {
    type Element = HeadlessElement;
    type Page = HeadlessPage;

    async fn pages(&self) -> Result<Vec<HeadlessPage>, DriverError> {
        let client = self.client()?;
        let pages = client
            .browser
            .pages()
            .await
            .map_err(|e| DriverError::Browser(format!("Get pages failed: {}", e)))?;
        Ok(pages.into_iter().map(HeadlessPage::new).collect())
    }

    async fn storage_state(&self) -> Result<StorageState, DriverError> {
        let client = self.client()?;
        let cookies = client
            .page
            .get_cookies()
            .await
            .map_err(|e| DriverError::Browser(format!("Get cookies failed: {}", e)))?;

        Ok(StorageState {
            cookies: cookies
                .into_iter()
                .map(|c| Cookie {
                    name: c.name,
                    value: c.value,
                    domain: Some(c.domain),
                    path: Some(c.path),
                    expires: Some(c.expires),
                    http_only: Some(c.http_only),
                    secure: Some(c.secure),
                })
                .collect(),
        })
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        if let Some(client) = self.client.take() {
            client.close().await.map_err(browser_err)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Page
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct HeadlessPage {
    inner: Page,
    /// Last pointer position moved to via `move_mouse`; `mouse_down` presses
    /// there.
    pointer: Arc<Mutex<(f64, f64)>>,
}

impl HeadlessPage {
    fn new(inner: Page) -> Self {
        Self {
            inner,
            pointer: Arc::new(Mutex::new((0.0, 0.0))),
        }
    }

    fn element(&self, inner: CdpElement) -> HeadlessElement {
        HeadlessElement {
            inner: Arc::new(inner),
            page: self.inner.clone(),
        }
    }

    /// Install the text-query helper into the current document if absent.
    async fn ensure_helper(&self) -> Result<(), DriverError> {
        let is_loaded: bool = self
            .inner
            .evaluate("typeof window.__docshot !== 'undefined'")
            .await
            .map_err(browser_err)?
            .into_value()
            .map_err(browser_err)?;

        if !is_loaded {
            self.inner.evaluate(FIND_TEXT_JS).await.map_err(browser_err)?;
        }
        Ok(())
    }

    async fn find_by_css(&self, css: &str) -> Result<Vec<CdpElement>, DriverError> {
        match self.inner.find_elements(css).await {
            Ok(elements) => Ok(elements),
            Err(e) => {
                let message = e.to_string();
                if message.contains("Syntax") || message.contains("not a valid selector") {
                    Err(invalid_expression(css, message))
                } else {
                    Err(DriverError::Browser(message))
                }
            }
        }
    }

    async fn find_by_xpath(&self, xpath: &str) -> Result<Vec<CdpElement>, DriverError> {
        // Count first: an empty search result and a bad expression are hard
        // to tell apart from the search API alone.
        let xpath_json = serde_json::to_string(xpath).map_err(browser_err)?;
        let script = format!(
            "document.evaluate({xpath_json}, document, null, \
             XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null).snapshotLength"
        );
        let count: i64 = self
            .inner
            .evaluate(script)
            .await
            .map_err(|e| invalid_expression(xpath, e))?
            .into_value()
            .map_err(|e| invalid_expression(xpath, e))?;

        if count == 0 {
            return Ok(Vec::new());
        }
        self.inner.find_xpaths(xpath).await.map_err(browser_err)
    }
}

#[async_trait]
impl docshot_engine::driver::Page for HeadlessPage {
    type Element = HeadlessElement;

    fn is_same(&self, other: &Self) -> bool {
        self.inner.target_id() == other.inner.target_id()
    }

    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        self.inner
            .goto(url)
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self
            .inner
            .url()
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?
            .unwrap_or_default())
    }

    async fn wait_for_load(&self, timeout: Duration) -> Result<(), DriverError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Evaluation fails while a navigation swaps the execution
            // context; that counts as "not settled yet".
            let state = match self.inner.evaluate("document.readyState").await {
                Ok(result) => result.into_value::<String>().unwrap_or_default(),
                Err(_) => String::new(),
            };
            if state == "complete" {
                return Ok(());
            }
            if tokio::time::Instant::now() + LOAD_POLL_INTERVAL > deadline {
                return Err(DriverError::Timeout(timeout));
            }
            tokio::time::sleep(LOAD_POLL_INTERVAL).await;
        }
    }

    async fn query_selector_all(
        &self,
        expression: &str,
    ) -> Result<Vec<HeadlessElement>, DriverError> {
        let found = match parse_expression(expression) {
            QueryKind::Css(css) => self.find_by_css(css).await?,
            QueryKind::Xpath(xpath) => self.find_by_xpath(xpath).await?,
        };
        Ok(found.into_iter().map(|e| self.element(e)).collect())
    }

    async fn query_text_all(
        &self,
        query: &TextQuery,
        scope: Option<&HeadlessElement>,
    ) -> Result<Vec<HeadlessElement>, DriverError> {
        self.ensure_helper().await?;

        if let Some(scope) = scope {
            let mark = format!("function() {{ this.setAttribute('{SCOPE_ATTR}', ''); }}");
            js_value(scope.inner.call_js_fn(mark, false).await.map_err(browser_err)?)?;
        }

        let args = serde_json::json!({
            "text": query.text,
            "exact": query.match_mode == MatchMode::Exact,
            "scoped": scope.is_some(),
        });
        let count: i64 = self
            .inner
            .evaluate(format!("window.__docshot.markTextMatches({args})"))
            .await
            .map_err(browser_err)?
            .into_value()
            .map_err(browser_err)?;
        tracing::trace!(count, text = %query.text, "text query marked matches");

        let found = self
            .inner
            .find_elements(format!("[{HIT_ATTR}]"))
            .await
            .map_err(browser_err)?;
        Ok(found.into_iter().map(|e| self.element(e)).collect())
    }

    async fn screenshot(&self, request: &CaptureRequest, path: &Path) -> Result<(), DriverError> {
        let mut builder = ScreenshotParams::builder();
        builder = match request.format {
            CaptureFormat::Png => builder.format(CaptureScreenshotFormat::Png),
            CaptureFormat::Jpeg { quality } => builder
                .format(CaptureScreenshotFormat::Jpeg)
                .quality(quality as i64),
        };
        if let Some(clip) = &request.clip {
            let viewport = Viewport::builder()
                .x(clip.x)
                .y(clip.y)
                .width(clip.width)
                .height(clip.height)
                .scale(1.0)
                .build()
                .map_err(|e| DriverError::Browser(format!("invalid clip region: {e}")))?;
            builder = builder.clip(viewport);
        }
        builder = builder
            .full_page(request.full_page)
            .omit_background(request.omit_background);

        let bytes = self
            .inner
            .screenshot(builder.build())
            .await
            .map_err(|e| DriverError::Browser(format!("Screenshot failed: {}", e)))?;

        tokio::fs::write(path, &bytes).await?;
        Ok(())
    }

    async fn move_mouse(&self, x: f64, y: f64) -> Result<(), DriverError> {
        dispatch_mouse(&self.inner, DispatchMouseEventType::MouseMoved, x, y, None, None).await?;
        if let Ok(mut pointer) = self.pointer.lock() {
            *pointer = (x, y);
        }
        Ok(())
    }

    async fn mouse_down(&self) -> Result<(), DriverError> {
        let (x, y) = self.pointer.lock().map(|p| *p).unwrap_or((0.0, 0.0));
        dispatch_mouse(
            &self.inner,
            DispatchMouseEventType::MousePressed,
            x,
            y,
            Some(CdpMouseButton::Left),
            Some(1),
        )
        .await
    }
}

// ---------------------------------------------------------------------------
// Element
// ---------------------------------------------------------------------------

const VISIBLE_JS: &str = r#"function() {
    const rect = this.getBoundingClientRect();
    const style = window.getComputedStyle(this);
    return rect.width > 0 && rect.height > 0
        && style.visibility !== 'hidden' && style.display !== 'none';
}"#;

const BOUNDING_BOX_JS: &str = r#"function() {
    const rect = this.getBoundingClientRect();
    return JSON.stringify({ x: rect.x, y: rect.y, width: rect.width, height: rect.height });
}"#;

const CLEAR_VALUE_JS: &str = r#"function() {
    if ('value' in this) {
        this.value = '';
        this.dispatchEvent(new Event('input', { bubbles: true }));
    }
}"#;

const IS_CHECKED_JS: &str = "function() { return !!this.checked; }";

#[derive(Clone)]
pub struct HeadlessElement {
    inner: Arc<CdpElement>,
    page: Page,
}

impl HeadlessElement {
    async fn call(&self, function: &str) -> Result<serde_json::Value, DriverError> {
        js_value(
            self.inner
                .call_js_fn(function, false)
                .await
                .map_err(browser_err)?,
        )
    }

    async fn center(&self) -> Result<(f64, f64), DriverError> {
        self.inner.scroll_into_view().await.map_err(browser_err)?;
        let bounds = self.bounding_box().await?;
        Ok((
            bounds.x + bounds.width / 2.0,
            bounds.y + bounds.height / 2.0,
        ))
    }

    async fn dispatch_click(&self, button: MouseButton, clicks: i64) -> Result<(), DriverError> {
        let (x, y) = self.center().await?;
        let button = cdp_button(button);
        dispatch_mouse(&self.page, DispatchMouseEventType::MouseMoved, x, y, None, None).await?;
        for count in 1..=clicks {
            dispatch_mouse(
                &self.page,
                DispatchMouseEventType::MousePressed,
                x,
                y,
                Some(button.clone()),
                Some(count),
            )
            .await?;
            dispatch_mouse(
                &self.page,
                DispatchMouseEventType::MouseReleased,
                x,
                y,
                Some(button.clone()),
                Some(count),
            )
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl docshot_engine::driver::Element for HeadlessElement {
    async fn is_visible(&self) -> Result<bool, DriverError> {
        Ok(self.call(VISIBLE_JS).await?.as_bool().unwrap_or(false))
    }

    async fn bounding_box(&self) -> Result<BoundingBox, DriverError> {
        let value = self.call(BOUNDING_BOX_JS).await?;
        let raw = value
            .as_str()
            .ok_or_else(|| DriverError::Browser("element has no layout box".into()))?;
        serde_json::from_str(raw)
            .map_err(|e| DriverError::Browser(format!("bad bounding box payload: {e}")))
    }

    async fn click(&self, button: MouseButton) -> Result<(), DriverError> {
        self.dispatch_click(button, 1).await
    }

    async fn double_click(&self, button: MouseButton) -> Result<(), DriverError> {
        self.dispatch_click(button, 2).await
    }

    async fn hover(&self) -> Result<(), DriverError> {
        // Sustained hover: park the pointer on the element and hold the
        // button down, so hover-only UI stays open for the next capture.
        let (x, y) = self.center().await?;
        dispatch_mouse(&self.page, DispatchMouseEventType::MouseMoved, x, y, None, None).await?;
        dispatch_mouse(
            &self.page,
            DispatchMouseEventType::MousePressed,
            x,
            y,
            Some(CdpMouseButton::Left),
            Some(1),
        )
        .await
    }

    async fn fill(&self, value: &str) -> Result<(), DriverError> {
        self.call(CLEAR_VALUE_JS).await?;
        self.inner.focus().await.map_err(browser_err)?;
        self.inner.type_str(value).await.map_err(browser_err)?;
        Ok(())
    }

    async fn check(&self) -> Result<(), DriverError> {
        let checked = self.call(IS_CHECKED_JS).await?.as_bool().unwrap_or(false);
        if !checked {
            self.click(MouseButton::Left).await?;
        }
        Ok(())
    }

    async fn select_option(&self, value: &str) -> Result<(), DriverError> {
        let wanted = serde_json::to_string(value).map_err(browser_err)?;
        let script = format!(
            r#"function() {{
    const wanted = {wanted};
    let hit = false;
    for (const option of this.options || []) {{
        const matched = option.value === wanted || option.label === wanted;
        option.selected = matched;
        hit = hit || matched;
    }}
    this.dispatchEvent(new Event('input', {{ bubbles: true }}));
    this.dispatchEvent(new Event('change', {{ bubbles: true }}));
    return hit;
}}"#
        );
        let hit = self.call(&script).await?.as_bool().unwrap_or(false);
        if !hit {
            return Err(DriverError::Browser(format!(
                "no option matching '{value}'"
            )));
        }
        Ok(())
    }

    async fn upload_file(&self, path: &Path) -> Result<(), DriverError> {
        let file = path.to_string_lossy().into_owned();
        let params = SetFileInputFilesParams::builder()
            .files(vec![file])
            .backend_node_id(self.inner.backend_node_id.clone())
            .build()
            .map_err(|e| DriverError::Browser(format!("Failed to build file input: {:?}", e)))?;
        self.page.execute(params).await.map_err(browser_err)?;
        Ok(())
    }

    async fn focus(&self) -> Result<(), DriverError> {
        self.inner.focus().await.map_err(browser_err)?;
        Ok(())
    }

    async fn drag_to(&self, target: &Self) -> Result<(), DriverError> {
        let (from_x, from_y) = self.center().await?;
        let (to_x, to_y) = target.center().await?;

        dispatch_mouse(
            &self.page,
            DispatchMouseEventType::MouseMoved,
            from_x,
            from_y,
            None,
            None,
        )
        .await?;
        dispatch_mouse(
            &self.page,
            DispatchMouseEventType::MousePressed,
            from_x,
            from_y,
            Some(CdpMouseButton::Left),
            Some(1),
        )
        .await?;

        // Stepped moves: drop targets that track dragover need intermediate
        // positions, not a teleporting pointer.
        for step in 1..=DRAG_STEPS {
            let t = step as f64 / DRAG_STEPS as f64;
            dispatch_mouse(
                &self.page,
                DispatchMouseEventType::MouseMoved,
                from_x + (to_x - from_x) * t,
                from_y + (to_y - from_y) * t,
                Some(CdpMouseButton::Left),
                None,
            )
            .await?;
        }

        dispatch_mouse(
            &self.page,
            DispatchMouseEventType::MouseReleased,
            to_x,
            to_y,
            Some(CdpMouseButton::Left),
            Some(1),
        )
        .await
    }
}
