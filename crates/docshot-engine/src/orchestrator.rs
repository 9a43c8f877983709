//! Chain orchestration: navigate once, run the steps in order, always tear
//! the session down.

use crate::dispatch::{ActionError, DEFAULT_LOAD_TIMEOUT, Dispatcher};
use crate::driver::{Driver, DriverError, Page};
use docshot_core::protocol::Chain;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("invalid chain url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// A step failed. Carries the author's breadcrumb for the step so a
    /// failure deep in a long chain reads as more than a bare index.
    #[error("step {index} ({note}) failed: {source}")]
    Step {
        index: usize,
        note: String,
        #[source]
        source: ActionError,
    },

    #[error(transparent)]
    Driver(#[from] DriverError),
}

pub struct ChainRunner<D: Driver> {
    driver: D,
    active_page: D::Page,
    base_url: Url,
    dispatcher: Dispatcher,
}

impl<D: Driver> ChainRunner<D> {
    /// `page` is the already-authenticated page of `driver`; the session was
    /// established by the caller before the runner takes ownership.
    pub fn new(driver: D, page: D::Page, base_url: Url, dispatcher: Dispatcher) -> Self {
        Self {
            driver,
            active_page: page,
            base_url,
            dispatcher,
        }
    }

    /// Run the chain and close the browser session on every exit path.
    pub async fn run_to_completion(mut self, chain: &Chain) -> Result<(), ChainError> {
        let result = self.run(chain).await;
        if let Err(e) = self.driver.close().await {
            warn!(chain = %chain.name, "error closing browser session: {e}");
        }
        result
    }

    async fn run(&mut self, chain: &Chain) -> Result<(), ChainError> {
        let target = self
            .base_url
            .join(&chain.url)
            .map_err(|e| ChainError::InvalidUrl {
                url: chain.url.clone(),
                reason: e.to_string(),
            })?;

        info!(chain = %chain.name, url = %target, "navigating");
        self.active_page.goto(target.as_str()).await?;
        if let Err(e) = self.active_page.wait_for_load(DEFAULT_LOAD_TIMEOUT).await {
            warn!(chain = %chain.name, "initial load did not settle: {e}");
        }

        for (index, action) in chain.actions.iter().enumerate() {
            info!(chain = %chain.name, step = index, action = action.detail.kind(), "running step");
            match self
                .dispatcher
                .execute(&self.driver, &self.active_page, action)
                .await
            {
                Ok(page) => self.active_page = page,
                // Failure aborts the rest of this chain; sibling chains run
                // in their own sessions and are unaffected.
                Err(source) => {
                    return Err(ChainError::Step {
                        index,
                        note: action
                            .note
                            .clone()
                            .unwrap_or_else(|| action.detail.kind().to_string()),
                        source,
                    });
                }
            }
        }

        info!(chain = %chain.name, steps = chain.actions.len(), "chain completed");
        Ok(())
    }
}
