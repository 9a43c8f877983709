//! Action dispatch: one action in, the page subsequent actions target out.

use crate::capture::{CaptureError, Capturer};
use crate::driver::{Driver, DriverError, Element, Page};
use crate::resolver::{self, SelectorError};
use docshot_core::protocol::{Action, ActionDetail};
use docshot_core::selector::ElementSelector;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

/// How long to wait for a settled load state after an action.
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

const NEW_PAGE_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Selector(#[from] SelectorError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("no new page was opened within {0:?}")]
    NewPageTimeout(Duration),

    #[error(transparent)]
    Driver(#[from] DriverError),
}

pub struct Dispatcher {
    output_dir: PathBuf,
    capturer: Capturer,
    resolve_timeout: Duration,
    load_timeout: Duration,
}

impl Dispatcher {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            capturer: Capturer::new(),
            resolve_timeout: resolver::DEFAULT_VISIBILITY_TIMEOUT,
            load_timeout: DEFAULT_LOAD_TIMEOUT,
        }
    }

    pub fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    /// Execute one action against `page`.
    ///
    /// Returns the page subsequent actions should target: the same page in
    /// the common case, the freshly opened one after a new-tab hand-off.
    pub async fn execute<D: Driver>(
        &self,
        driver: &D,
        page: &D::Page,
        action: &Action,
    ) -> Result<D::Page, ActionError> {
        debug!(action = action.detail.kind(), "executing action");

        let active = if action.opens_new_page {
            let timeout = Duration::from_millis(action.new_page_timeout_ms);
            let known = driver.pages().await?;
            self.perform(page, &action.detail).await?;
            let fresh = self.await_new_page(driver, &known, timeout).await?;
            info!("switching to the newly opened page");
            fresh
        } else {
            self.perform(page, &action.detail).await?;
            page.clone()
        };

        // Many SPA transitions never reach a classic idle state; a timeout
        // here is logged and the chain moves on.
        if let Err(e) = active.wait_for_load(self.load_timeout).await {
            warn!("load state did not settle after action: {e}");
        }

        if let Some(delay) = action.post_action_delay_ms {
            sleep(Duration::from_millis(delay)).await;
        }

        Ok(active)
    }

    async fn perform<P: Page>(&self, page: &P, detail: &ActionDetail) -> Result<(), ActionError> {
        match detail {
            ActionDetail::Click(request) => {
                let element = self.resolve(page, &request.selector).await?;
                element.click(request.button).await?;
            }
            ActionDetail::DoubleClick(request) => {
                let element = self.resolve(page, &request.selector).await?;
                element.double_click(request.button).await?;
            }
            ActionDetail::Hover(request) => {
                let element = self.resolve(page, &request.selector).await?;
                element.hover().await?;
            }
            ActionDetail::Fill(request) => {
                let element = self.resolve(page, &request.selector).await?;
                element.fill(&request.value).await?;
            }
            ActionDetail::Check(request) => {
                let element = self.resolve(page, &request.selector).await?;
                element.check().await?;
            }
            ActionDetail::SelectOption(request) => {
                let element = self.resolve(page, &request.selector).await?;
                element.select_option(&request.value).await?;
            }
            ActionDetail::UploadFile(request) => {
                let element = self.resolve(page, &request.selector).await?;
                element.upload_file(&request.path).await?;
            }
            ActionDetail::Focus(request) => {
                let element = self.resolve(page, &request.selector).await?;
                element.focus().await?;
            }
            ActionDetail::DragAndDrop(request) => {
                let from = self.resolve(page, &request.from).await?;
                let to = self.resolve(page, &request.to).await?;
                from.drag_to(&to).await?;
            }
            ActionDetail::Screenshot(request) => {
                let path = self.output_path(&request.filename);
                match &request.target {
                    Some(selector) => {
                        let element = self.resolve(page, selector).await?;
                        self.capturer
                            .capture_element(page, &element, &path, request.padding, &request.options)
                            .await?;
                    }
                    None => {
                        self.capturer
                            .capture_full_page(page, &path, &request.options)
                            .await?;
                    }
                }
                info!(path = %path.display(), "screenshot saved");
            }
        }
        Ok(())
    }

    fn output_path(&self, filename: &str) -> PathBuf {
        // Chain configs often write filenames with a leading '/': those are
        // relative to the output dir, not the filesystem root.
        self.output_dir.join(filename.trim_start_matches('/'))
    }

    async fn resolve<P: Page>(
        &self,
        page: &P,
        selector: &ElementSelector,
    ) -> Result<P::Element, ActionError> {
        Ok(resolver::resolve(page, selector, self.resolve_timeout).await?)
    }

    /// Poll for a page that was not in `known` until `timeout` runs out.
    async fn await_new_page<D: Driver>(
        &self,
        driver: &D,
        known: &[D::Page],
        timeout: Duration,
    ) -> Result<D::Page, ActionError> {
        let deadline = Instant::now() + timeout;
        loop {
            for candidate in driver.pages().await? {
                if !known.iter().any(|page| page.is_same(&candidate)) {
                    return Ok(candidate);
                }
            }
            if Instant::now() + NEW_PAGE_POLL_INTERVAL > deadline {
                return Err(ActionError::NewPageTimeout(timeout));
            }
            sleep(NEW_PAGE_POLL_INTERVAL).await;
        }
    }
}
