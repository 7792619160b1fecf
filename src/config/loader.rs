use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

use crate::config::models::{AppConfig, ConfigOverrides};
use crate::config::validation::{ConfigValidator, ValidationError};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Read a settings file. JSON files load too, YAML being a superset.
pub async fn load_config<P: AsRef<Path>>(path: P) -> ConfigResult<AppConfig> {
    let path = path.as_ref();
    let config_content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    // An empty document parses as null rather than as an empty mapping
    if config_content.trim().is_empty() {
        return Ok(AppConfig::default());
    }
    let config: AppConfig = serde_yaml::from_str(&config_content)?;
    Ok(config)
}

/// Defaults, then the settings file if any, then command-line overrides,
/// then validation.
pub async fn resolve_config(
    file: Option<&Path>,
    overrides: &ConfigOverrides,
) -> ConfigResult<AppConfig> {
    let mut config = match file {
        Some(path) => load_config(path).await?,
        None => AppConfig::default(),
    };
    config.apply(overrides);
    ConfigValidator::validate(&config)?;
    Ok(config)
}
