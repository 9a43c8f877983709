//! The automation driver seam.
//!
//! The engine never talks to a browser directly; it drives these traits. The
//! concrete implementation lives in `docshot-h` (headless Chromium), and the
//! engine tests supply a scripted mock.

use async_trait::async_trait;
use docshot_core::geometry::{BoundingBox, ClipRect};
use docshot_core::protocol::{CaptureFormat, MouseButton, StorageState};
use docshot_core::selector::TextQuery;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("browser not running")]
    NotReady,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("invalid query expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    #[error("browser error: {0}")]
    Browser(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parameters for one screenshot capture, assembled by the capturer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CaptureRequest {
    pub full_page: bool,
    pub clip: Option<ClipRect>,
    pub format: CaptureFormat,
    pub omit_background: bool,
}

/// A browser context: owns the open pages and the persistent session state.
#[async_trait]
pub trait Driver: Send + Sync {
    type Element: Element;
    type Page: Page<Element = Self::Element>;

    /// All pages currently open in this context.
    async fn pages(&self) -> Result<Vec<Self::Page>, DriverError>;

    /// Snapshot the context's persistent session state.
    async fn storage_state(&self) -> Result<StorageState, DriverError>;

    /// Close the browser and release its resources.
    async fn close(&mut self) -> Result<(), DriverError>;
}

/// One browser tab.
#[async_trait]
pub trait Page: Send + Sync + Clone {
    type Element: Element;

    /// Tab identity, used to spot newly opened pages.
    fn is_same(&self, other: &Self) -> bool;

    async fn goto(&self, url: &str) -> Result<(), DriverError>;

    async fn current_url(&self) -> Result<String, DriverError>;

    /// Wait for the page to reach a settled load state. Callers decide
    /// whether a timeout here is fatal; SPA transitions often never settle.
    async fn wait_for_load(&self, timeout: Duration) -> Result<(), DriverError>;

    /// All elements matching a native query expression (CSS, or XPath with
    /// an `xpath=` prefix or a leading `/`).
    async fn query_selector_all(
        &self,
        expression: &str,
    ) -> Result<Vec<Self::Element>, DriverError>;

    /// All elements whose own rendered text matches the query, optionally
    /// restricted to the subtree under `scope`.
    async fn query_text_all(
        &self,
        query: &TextQuery,
        scope: Option<&Self::Element>,
    ) -> Result<Vec<Self::Element>, DriverError>;

    /// Capture the page (or the clip region) to an image file.
    async fn screenshot(&self, request: &CaptureRequest, path: &Path) -> Result<(), DriverError>;

    async fn move_mouse(&self, x: f64, y: f64) -> Result<(), DriverError>;

    async fn mouse_down(&self) -> Result<(), DriverError>;
}

/// A resolved element handle on some page.
#[async_trait]
pub trait Element: Send + Sync + Clone {
    async fn is_visible(&self) -> Result<bool, DriverError>;

    async fn bounding_box(&self) -> Result<BoundingBox, DriverError>;

    async fn click(&self, button: MouseButton) -> Result<(), DriverError>;

    async fn double_click(&self, button: MouseButton) -> Result<(), DriverError>;

    /// Sustained hover: pointer moved onto the element with the button held.
    async fn hover(&self) -> Result<(), DriverError>;

    async fn fill(&self, value: &str) -> Result<(), DriverError>;

    async fn check(&self) -> Result<(), DriverError>;

    async fn select_option(&self, value: &str) -> Result<(), DriverError>;

    async fn upload_file(&self, path: &Path) -> Result<(), DriverError>;

    async fn focus(&self) -> Result<(), DriverError>;

    async fn drag_to(&self, target: &Self) -> Result<(), DriverError>;
}
