//! Selector resolution: one selector in, exactly one visible element out.

use crate::driver::{DriverError, Element, Page};
use docshot_core::selector::ElementSelector;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, sleep};
use tracing::debug;

/// How long to wait for a match to become visible.
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(10);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Resolution failures.
///
/// `NotFound` and `Ambiguous` deliberately render the same generic message;
/// the precise cause stays on the variant and is logged at debug where the
/// resolution happened.
#[derive(Debug, Error)]
pub enum SelectorError {
    #[error("element not found or invisible")]
    NotFound { query: String },

    #[error("element not found or invisible")]
    Ambiguous { query: String, count: usize },

    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Resolve `selector` against `page` to exactly one element.
///
/// Polls until at least one match is visible, then asserts the match set has
/// cardinality one. A visibility timeout is reported the same way as zero
/// matches.
pub async fn resolve<P: Page>(
    page: &P,
    selector: &ElementSelector,
    timeout: Duration,
) -> Result<P::Element, SelectorError> {
    let deadline = Instant::now() + timeout;

    loop {
        let matches = query_all(page, selector).await?;

        let mut any_visible = false;
        for element in &matches {
            if element.is_visible().await? {
                any_visible = true;
                break;
            }
        }

        if any_visible {
            return match matches.as_slice() {
                [only] => Ok(only.clone()),
                _ => {
                    debug!(query = %selector, count = matches.len(), "selector is ambiguous");
                    Err(SelectorError::Ambiguous {
                        query: selector.to_string(),
                        count: matches.len(),
                    })
                }
            };
        }

        if Instant::now() + POLL_INTERVAL > deadline {
            debug!(query = %selector, "no visible match before deadline");
            return Err(SelectorError::NotFound {
                query: selector.to_string(),
            });
        }
        sleep(POLL_INTERVAL).await;
    }
}

async fn query_all<P: Page>(
    page: &P,
    selector: &ElementSelector,
) -> Result<Vec<P::Element>, SelectorError> {
    match selector {
        ElementSelector::Text(query) => Ok(page.query_text_all(query, None).await?),
        ElementSelector::Locator(query) => Ok(page.query_selector_all(&query.expression).await?),
        ElementSelector::Complex { locator, text } => {
            // Narrow the scope by the locator first, then look the text up
            // inside each scope. Not an intersection of two page-wide queries.
            let scopes = page.query_selector_all(&locator.expression).await?;
            let mut found = Vec::new();
            for scope in &scopes {
                found.extend(page.query_text_all(text, Some(scope)).await?);
            }
            Ok(found)
        }
    }
}
