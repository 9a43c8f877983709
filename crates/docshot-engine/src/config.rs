use docshot_core::config::DocshotConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// Also raised for unrecognized action `type` tags: the action set is a
    /// closed enum, so unknown tags are rejected here at the config boundary.
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from default locations:
    /// 1. ./docshot.yaml
    /// 2. ~/.docshot/config.yaml
    pub async fn load_default() -> Result<DocshotConfig, ConfigError> {
        let local_config = PathBuf::from("./docshot.yaml");
        if local_config.exists() {
            return Self::load_from(&local_config).await;
        }

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".docshot").join("config.yaml");
            if home_config.exists() {
                return Self::load_from(&home_config).await;
            }
        }

        Err(ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no docshot.yaml in the working directory and no ~/.docshot/config.yaml",
        )))
    }

    pub async fn load_from(path: &Path) -> Result<DocshotConfig, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: DocshotConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }
}
