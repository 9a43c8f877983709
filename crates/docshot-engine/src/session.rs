//! Authenticated-session establishment.
//!
//! Tries the cached storage state first: the caller launches the browser
//! context pre-seeded with it, and the manager probes an authenticated-only
//! route. When the probe never settles on the success pattern the manager
//! falls through to the scripted credential flow and overwrites the cache.

use crate::delay::DelayPolicy;
use crate::dispatch::DEFAULT_LOAD_TIMEOUT;
use crate::driver::{Driver, DriverError, Element, Page};
use crate::resolver::{self, SelectorError};
use docshot_core::config::AuthConfig;
use docshot_core::protocol::{MouseButton, StorageState};
use docshot_core::selector::{ElementSelector, LocatorQuery};
use glob::Pattern;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, sleep};
use tracing::{info, warn};

/// How long the settled URL gets to match the success pattern.
pub const DEFAULT_ROUTE_TIMEOUT: Duration = Duration::from_secs(15);

const URL_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum SessionError {
    /// The credential flow never reached the authenticated route. Fatal for
    /// this session; any retry policy belongs to the caller.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("invalid success pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid auth route '{route}': {reason}")]
    InvalidRoute { route: String, reason: String },

    #[error(transparent)]
    Selector(#[from] SelectorError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("failed to persist session state: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize session state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// How the session ended up authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    CachedState,
    Credentials,
}

pub struct SessionManager<'a> {
    auth: &'a AuthConfig,
    base_url: &'a url::Url,
    delays: &'a dyn DelayPolicy,
    route_timeout: Duration,
}

impl<'a> SessionManager<'a> {
    pub fn new(auth: &'a AuthConfig, base_url: &'a url::Url, delays: &'a dyn DelayPolicy) -> Self {
        Self {
            auth,
            base_url,
            delays,
            route_timeout: DEFAULT_ROUTE_TIMEOUT,
        }
    }

    pub fn with_route_timeout(mut self, timeout: Duration) -> Self {
        self.route_timeout = timeout;
        self
    }

    /// Establish an authenticated session on `page`.
    pub async fn establish<D: Driver>(
        &self,
        driver: &D,
        page: &D::Page,
    ) -> Result<AuthMethod, SessionError> {
        let probe = self.join_route(&self.auth.probe_url)?;
        page.goto(probe.as_str()).await?;
        self.settle(page).await;

        match self.wait_for_route(page).await {
            Ok(()) => {
                info!("authenticated from cached session state");
                Ok(AuthMethod::CachedState)
            }
            Err(SessionError::AuthenticationFailed(_)) => {
                info!("cached session state rejected, falling back to credentials");
                self.login(driver, page).await?;
                Ok(AuthMethod::Credentials)
            }
            Err(e) => Err(e),
        }
    }

    async fn login<D: Driver>(&self, driver: &D, page: &D::Page) -> Result<(), SessionError> {
        let login = self.join_route(&self.auth.login_url)?;
        page.goto(login.as_str()).await?;
        self.settle(page).await;

        // Park the pointer somewhere plausible and hold the button before
        // the first keystroke; zero-movement submissions trip bot heuristics.
        let (x, y) = self.delays.pointer_start();
        page.move_mouse(x, y).await?;
        page.mouse_down().await?;

        self.pause().await;
        self.fill_field(page, &self.auth.email_selector, &self.auth.email)
            .await?;
        self.pause().await;
        self.click_field(page, &self.auth.submit_selector).await?;
        self.pause().await;
        self.fill_field(page, &self.auth.password_selector, &self.auth.password)
            .await?;
        self.pause().await;
        self.click_field(page, &self.auth.submit_selector).await?;

        self.settle(page).await;
        self.wait_for_route(page).await?;

        self.persist_state(driver).await
    }

    async fn wait_for_route<P: Page>(&self, page: &P) -> Result<(), SessionError> {
        let pattern =
            Pattern::new(&self.auth.success_pattern).map_err(|e| SessionError::InvalidPattern {
                pattern: self.auth.success_pattern.clone(),
                reason: e.to_string(),
            })?;

        let deadline = Instant::now() + self.route_timeout;
        loop {
            let url = page.current_url().await?;
            if pattern.matches(&url) {
                return Ok(());
            }
            if Instant::now() + URL_POLL_INTERVAL > deadline {
                return Err(SessionError::AuthenticationFailed(format!(
                    "url '{url}' never matched '{}'",
                    self.auth.success_pattern
                )));
            }
            sleep(URL_POLL_INTERVAL).await;
        }
    }

    async fn pause(&self) {
        let pause = self.delays.step_pause();
        if !pause.is_zero() {
            sleep(pause).await;
        }
    }

    async fn settle<P: Page>(&self, page: &P) {
        if let Err(e) = page.wait_for_load(DEFAULT_LOAD_TIMEOUT).await {
            warn!("load state did not settle: {e}");
        }
    }

    async fn fill_field<P: Page>(
        &self,
        page: &P,
        expression: &str,
        value: &str,
    ) -> Result<(), SessionError> {
        let element = self.resolve_field(page, expression).await?;
        element.fill(value).await?;
        Ok(())
    }

    async fn click_field<P: Page>(&self, page: &P, expression: &str) -> Result<(), SessionError> {
        let element = self.resolve_field(page, expression).await?;
        element.click(MouseButton::Left).await?;
        Ok(())
    }

    async fn resolve_field<P: Page>(
        &self,
        page: &P,
        expression: &str,
    ) -> Result<P::Element, SessionError> {
        let selector = ElementSelector::Locator(LocatorQuery::new(expression));
        Ok(resolver::resolve(page, &selector, resolver::DEFAULT_VISIBILITY_TIMEOUT).await?)
    }

    async fn persist_state<D: Driver>(&self, driver: &D) -> Result<(), SessionError> {
        let state = driver.storage_state().await?;
        let path = &self.auth.storage_state_path;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(&state)?;
        tokio::fs::write(path, json).await?;
        info!(path = %path.display(), "session state persisted");
        Ok(())
    }

    fn join_route(&self, route: &str) -> Result<url::Url, SessionError> {
        self.base_url
            .join(route)
            .map_err(|e| SessionError::InvalidRoute {
                route: route.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Read a previously persisted storage state, if a readable one exists.
///
/// An unreadable cache is treated like a missing one; the probe will fall
/// through to the credential flow and overwrite it.
pub async fn load_cached_state(path: &Path) -> Option<StorageState> {
    let raw = tokio::fs::read_to_string(path).await.ok()?;
    match serde_json::from_str(&raw) {
        Ok(state) => Some(state),
        Err(e) => {
            warn!(path = %path.display(), "ignoring unreadable session cache: {e}");
            None
        }
    }
}
