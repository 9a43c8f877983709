//! Configuration schema. Loading lives in the engine crate.

use crate::protocol::Chain;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocshotConfig {
    pub base_url: Url,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,
    #[serde(default)]
    pub chains: Vec<Chain>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./documentation-screenshots")
}

/// Scripted-login descriptor. Field selectors are native query expressions
/// (CSS or XPath) resolved with the same uniqueness rules as chain selectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Login form route, joined onto the base URL.
    pub login_url: String,
    /// Route that only renders for an authenticated session; probed first to
    /// decide whether the cached state is still accepted.
    pub probe_url: String,
    /// Glob pattern the settled URL must match to count as authenticated,
    /// e.g. `**/organization*`.
    pub success_pattern: String,
    pub email_selector: String,
    pub password_selector: String,
    pub submit_selector: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_storage_state_path")]
    pub storage_state_path: PathBuf,
}

fn default_storage_state_path() -> PathBuf {
    PathBuf::from("./auth.json")
}
