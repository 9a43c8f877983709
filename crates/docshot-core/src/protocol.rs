//! The action vocabulary and chain configuration types.
//!
//! Actions are a closed, internally tagged variant set: each action type is
//! its own variant carrying a request struct that enumerates exactly the
//! options that action accepts. Adding an action type is a compile-time
//! visible change, and an unrecognized `type` tag is rejected when the
//! configuration is parsed.

use crate::geometry::ClipRect;
use crate::selector::ElementSelector;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    #[default]
    Left,
    Middle,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickRequest {
    pub selector: ElementSelector,
    #[serde(default)]
    pub button: MouseButton,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoverRequest {
    pub selector: ElementSelector,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillRequest {
    pub selector: ElementSelector,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckRequest {
    pub selector: ElementSelector,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOptionRequest {
    pub selector: ElementSelector,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadFileRequest {
    pub selector: ElementSelector,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusRequest {
    pub selector: ElementSelector,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DragRequest {
    pub from: ElementSelector,
    pub to: ElementSelector,
}

/// Image format passed through to the capture driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CaptureFormat {
    #[default]
    Png,
    Jpeg {
        #[serde(default = "default_jpeg_quality")]
        quality: u8,
    },
}

fn default_jpeg_quality() -> u8 {
    80
}

/// Driver-facing capture options.
///
/// `clip` is an explicit override: when set it wins over the padded element
/// box the capturer computes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CaptureOptions {
    #[serde(default)]
    pub format: CaptureFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub omit_background: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip: Option<ClipRect>,
}

/// A screenshot step: full page when `target` is absent, element crop when
/// present. Element crops require the one target selector structurally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotRequest {
    /// Output file, relative to the configured output directory. May contain
    /// subdirectory segments; they are created on demand.
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ElementSelector>,
    #[serde(default = "default_padding")]
    pub padding: f64,
    #[serde(default)]
    pub options: CaptureOptions,
}

fn default_padding() -> f64 {
    20.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionDetail {
    Click(ClickRequest),
    DoubleClick(ClickRequest),
    Hover(HoverRequest),
    Fill(FillRequest),
    Check(CheckRequest),
    SelectOption(SelectOptionRequest),
    UploadFile(UploadFileRequest),
    Focus(FocusRequest),
    DragAndDrop(DragRequest),
    Screenshot(ScreenshotRequest),
}

impl ActionDetail {
    /// The action's tag, for logs and error breadcrumbs.
    pub fn kind(&self) -> &'static str {
        match self {
            ActionDetail::Click(_) => "click",
            ActionDetail::DoubleClick(_) => "double_click",
            ActionDetail::Hover(_) => "hover",
            ActionDetail::Fill(_) => "fill",
            ActionDetail::Check(_) => "check",
            ActionDetail::SelectOption(_) => "select_option",
            ActionDetail::UploadFile(_) => "upload_file",
            ActionDetail::Focus(_) => "focus",
            ActionDetail::DragAndDrop(_) => "drag_and_drop",
            ActionDetail::Screenshot(_) => "screenshot",
        }
    }
}

/// One step of a chain: the action plus its scheduling envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(flatten)]
    pub detail: ActionDetail,
    /// The interaction is expected to open a new browser tab; subsequent
    /// steps target that tab.
    #[serde(default)]
    pub opens_new_page: bool,
    #[serde(default = "default_new_page_timeout_ms")]
    pub new_page_timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_action_delay_ms: Option<u64>,
    /// Free-text breadcrumb; failures report it instead of a bare index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

fn default_new_page_timeout_ms() -> u64 {
    10_000
}

impl Action {
    pub fn new(detail: ActionDetail) -> Self {
        Self {
            detail,
            opens_new_page: false,
            new_page_timeout_ms: default_new_page_timeout_ms(),
            post_action_delay_ms: None,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn opening_new_page(mut self, timeout_ms: u64) -> Self {
        self.opens_new_page = true;
        self.new_page_timeout_ms = timeout_ms;
        self
    }
}

/// An ordered list of actions run against one navigation target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chain {
    pub name: String,
    /// Joined onto the configured base URL.
    pub url: String,
    pub actions: Vec<Action>,
}

/// One persisted cookie of the session storage state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
}

/// Serialized session state: written after a fresh interactive login, read
/// to pre-seed the browser context on later runs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StorageState {
    #[serde(default)]
    pub cookies: Vec<Cookie>,
}
