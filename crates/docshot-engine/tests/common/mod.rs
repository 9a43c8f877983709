//! Scripted mock of the driver traits.
//!
//! Nodes are declared up front; interactions append to a shared log so tests
//! can assert on what ran and in which order.

#![allow(dead_code)]

use async_trait::async_trait;
use docshot_core::geometry::BoundingBox;
use docshot_core::protocol::{MouseButton, StorageState};
use docshot_core::selector::TextQuery;
use docshot_engine::driver::{CaptureRequest, Driver, DriverError, Element, Page};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted DOM node.
#[derive(Debug, Clone)]
pub struct MockNode {
    pub key: String,
    /// Locator expressions this node answers to.
    pub expressions: Vec<String>,
    /// Rendered own text.
    pub text: Option<String>,
    /// Keys of scope nodes whose subtree contains this node.
    pub scopes: Vec<String>,
    pub visible: bool,
    pub bounds: BoundingBox,
}

impl MockNode {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            expressions: Vec::new(),
            text: None,
            scopes: Vec::new(),
            visible: true,
            bounds: BoundingBox {
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 10.0,
            },
        }
    }

    pub fn expression(mut self, expression: &str) -> Self {
        self.expressions.push(expression.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn inside(mut self, scope_key: &str) -> Self {
        self.scopes.push(scope_key.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn bounds(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.bounds = BoundingBox {
            x,
            y,
            width,
            height,
        };
        self
    }
}

#[derive(Debug, Default)]
pub struct MockState {
    pub nodes: Vec<MockNode>,
    pub log: Vec<String>,
    /// Node key -> visibility checks that still report hidden.
    pub visible_after: HashMap<String, u32>,
    pub captures: Vec<CaptureRequest>,
    /// Page ids that appear once `pages()` has been polled more than N times.
    pub pending_pages: Vec<(u32, String)>,
    pub pages_polls: u32,
    pub current_url: String,
    /// goto target -> landing url, simulating server-side redirects.
    pub redirects: HashMap<String, String>,
    /// Node key counted as the login submit control.
    pub submit_key: Option<String>,
    pub submit_clicks: u32,
    /// Where the second submit click lands the page.
    pub post_login_url: Option<String>,
    pub storage: StorageState,
    pub closed: bool,
}

#[derive(Clone, Default)]
pub struct MockDriver {
    pub state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    pub fn new(nodes: Vec<MockNode>) -> Self {
        let state = MockState {
            nodes,
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn page(&self) -> MockPage {
        MockPage {
            id: "page-0".to_string(),
            state: self.state.clone(),
        }
    }

    pub fn log(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn captures(&self) -> Vec<CaptureRequest> {
        self.state.lock().unwrap().captures.clone()
    }

    pub fn closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }
}

#[async_trait]
impl Driver for MockDriver {
    type Element = MockElement;
    type Page = MockPage;

    async fn pages(&self) -> Result<Vec<MockPage>, DriverError> {
        let mut state = self.state.lock().unwrap();
        state.pages_polls += 1;
        let polls = state.pages_polls;

        let mut pages = vec![MockPage {
            id: "page-0".to_string(),
            state: self.state.clone(),
        }];
        for (after, id) in &state.pending_pages {
            if polls > *after {
                pages.push(MockPage {
                    id: id.clone(),
                    state: self.state.clone(),
                });
            }
        }
        Ok(pages)
    }

    async fn storage_state(&self) -> Result<StorageState, DriverError> {
        Ok(self.state.lock().unwrap().storage.clone())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.state.lock().unwrap().closed = true;
        Ok(())
    }
}

#[derive(Clone)]
pub struct MockPage {
    pub id: String,
    pub state: Arc<Mutex<MockState>>,
}

impl MockPage {
    fn element(&self, node: &MockNode) -> MockElement {
        MockElement {
            node: node.clone(),
            state: self.state.clone(),
        }
    }
}

#[async_trait]
impl Page for MockPage {
    type Element = MockElement;

    fn is_same(&self, other: &Self) -> bool {
        self.id == other.id
    }

    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state.log.push(format!("goto:{url}"));
        state.current_url = state
            .redirects
            .get(url)
            .cloned()
            .unwrap_or_else(|| url.to_string());
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.state.lock().unwrap().current_url.clone())
    }

    async fn wait_for_load(&self, _timeout: Duration) -> Result<(), DriverError> {
        Ok(())
    }

    async fn query_selector_all(&self, expression: &str) -> Result<Vec<MockElement>, DriverError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .nodes
            .iter()
            .filter(|node| node.expressions.iter().any(|e| e == expression))
            .map(|node| self.element(node))
            .collect())
    }

    async fn query_text_all(
        &self,
        query: &TextQuery,
        scope: Option<&MockElement>,
    ) -> Result<Vec<MockElement>, DriverError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .nodes
            .iter()
            .filter(|node| {
                node.text
                    .as_deref()
                    .is_some_and(|text| query.match_mode.matches(text, &query.text))
            })
            .filter(|node| scope.is_none_or(|s| node.scopes.contains(&s.node.key)))
            .map(|node| self.element(node))
            .collect())
    }

    async fn screenshot(&self, request: &CaptureRequest, path: &Path) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state.captures.push(request.clone());
        state.log.push(format!("screenshot:{}", path.display()));
        std::fs::write(path, b"png")?;
        Ok(())
    }

    async fn move_mouse(&self, x: f64, y: f64) -> Result<(), DriverError> {
        self.state
            .lock()
            .unwrap()
            .log
            .push(format!("move_mouse:{x},{y}"));
        Ok(())
    }

    async fn mouse_down(&self) -> Result<(), DriverError> {
        self.state.lock().unwrap().log.push("mouse_down".to_string());
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct MockElement {
    pub node: MockNode,
    pub state: Arc<Mutex<MockState>>,
}

impl MockElement {
    fn log(&self, entry: String) {
        self.state.lock().unwrap().log.push(entry);
    }
}

#[async_trait]
impl Element for MockElement {
    async fn is_visible(&self) -> Result<bool, DriverError> {
        let mut state = self.state.lock().unwrap();
        if let Some(remaining) = state.visible_after.get_mut(&self.node.key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(false);
            }
        }
        Ok(self.node.visible)
    }

    async fn bounding_box(&self) -> Result<BoundingBox, DriverError> {
        Ok(self.node.bounds)
    }

    async fn click(&self, _button: MouseButton) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state.log.push(format!("click:{}", self.node.key));
        if state.submit_key.as_deref() == Some(self.node.key.as_str()) {
            state.submit_clicks += 1;
            if state.submit_clicks >= 2 {
                if let Some(url) = state.post_login_url.clone() {
                    state.current_url = url;
                }
            }
        }
        Ok(())
    }

    async fn double_click(&self, _button: MouseButton) -> Result<(), DriverError> {
        self.log(format!("double_click:{}", self.node.key));
        Ok(())
    }

    async fn hover(&self) -> Result<(), DriverError> {
        self.log(format!("hover:{}", self.node.key));
        Ok(())
    }

    async fn fill(&self, value: &str) -> Result<(), DriverError> {
        self.log(format!("fill:{}={value}", self.node.key));
        Ok(())
    }

    async fn check(&self) -> Result<(), DriverError> {
        self.log(format!("check:{}", self.node.key));
        Ok(())
    }

    async fn select_option(&self, value: &str) -> Result<(), DriverError> {
        self.log(format!("select_option:{}={value}", self.node.key));
        Ok(())
    }

    async fn upload_file(&self, path: &Path) -> Result<(), DriverError> {
        self.log(format!("upload_file:{}={}", self.node.key, path.display()));
        Ok(())
    }

    async fn focus(&self) -> Result<(), DriverError> {
        self.log(format!("focus:{}", self.node.key));
        Ok(())
    }

    async fn drag_to(&self, target: &Self) -> Result<(), DriverError> {
        self.log(format!("drag:{}->{}", self.node.key, target.node.key));
        Ok(())
    }
}
