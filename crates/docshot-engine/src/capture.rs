//! Screenshot capture: geometry computation and bounded driver calls.

use crate::driver::{CaptureRequest, DriverError, Element, Page};
use docshot_core::geometry::ClipRect;
use docshot_core::protocol::CaptureOptions;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CAPTURE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("screenshot timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to prepare output path: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Driver(#[from] DriverError),
}

pub struct Capturer {
    timeout: Duration,
}

impl Capturer {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_CAPTURE_TIMEOUT,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn capture_full_page<P: Page>(
        &self,
        page: &P,
        path: &Path,
        options: &CaptureOptions,
    ) -> Result<(), CaptureError> {
        let request = CaptureRequest {
            // An explicit clip in the options narrows a full-page capture too.
            full_page: options.clip.is_none(),
            clip: options.clip,
            format: options.format,
            omit_background: options.omit_background.unwrap_or(false),
        };
        self.capture(page, &request, path).await
    }

    pub async fn capture_element<P: Page>(
        &self,
        page: &P,
        element: &P::Element,
        path: &Path,
        padding: f64,
        options: &CaptureOptions,
    ) -> Result<(), CaptureError> {
        let clip = match options.clip {
            Some(clip) => clip,
            None => {
                let bounds = element.bounding_box().await?;
                ClipRect::padded(&bounds, padding)
            }
        };
        let request = CaptureRequest {
            full_page: false,
            clip: Some(clip),
            format: options.format,
            omit_background: options.omit_background.unwrap_or(false),
        };
        self.capture(page, &request, path).await
    }

    async fn capture<P: Page>(
        &self,
        page: &P,
        request: &CaptureRequest,
        path: &Path,
    ) -> Result<(), CaptureError> {
        // Filenames may carry subdirectory segments; create them on demand.
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        match tokio::time::timeout(self.timeout, page.screenshot(request, path)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(CaptureError::Timeout(self.timeout)),
        }
    }
}

impl Default for Capturer {
    fn default() -> Self {
        Self::new()
    }
}
