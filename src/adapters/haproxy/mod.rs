pub mod parser;
pub mod reload;
pub mod template;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::models::AppConfig;
use crate::core::entities::{BackendPool, Listener};
use crate::ports::config_renderer::{ConfigRenderer, RenderError, RenderResult};

pub use parser::parse_config;
pub use reload::{DEFAULT_RELOAD_COMMAND, run_reload_command};
pub use template::ConfigTemplate;

/// An HAProxy installation: its config file, the template it is generated
/// from and the command that makes the running process pick it up.
#[derive(Debug, Clone)]
pub struct HaproxyConfig {
    config_path: PathBuf,
    template: ConfigTemplate,
    reload_command: String,
    reload_timeout: Duration,
}

impl HaproxyConfig {
    pub fn new(
        config_path: impl Into<PathBuf>,
        template: ConfigTemplate,
        reload_command: impl Into<String>,
        reload_timeout: Duration,
    ) -> Self {
        let mut reload_command = reload_command.into();
        if reload_command.trim().is_empty() {
            reload_command = DEFAULT_RELOAD_COMMAND.to_string();
        }
        Self {
            config_path: config_path.into(),
            template,
            reload_command,
            reload_timeout,
        }
    }

    /// Build from application settings, loading the template file if one is set.
    pub async fn from_config(config: &AppConfig) -> RenderResult<Self> {
        let template = match &config.haproxy_template_path {
            Some(path) => {
                tracing::info!(path = %path.display(), "loading haproxy config template");
                ConfigTemplate::load(path).await?
            }
            None => ConfigTemplate::default(),
        };

        Ok(Self::new(
            &config.haproxy_config_path,
            template,
            &config.reload_command,
            config.reload_timeout(),
        ))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn template(&self) -> &ConfigTemplate {
        &self.template
    }

    pub fn reload_command(&self) -> &str {
        &self.reload_command
    }

    // Sibling path the new file is written to before it replaces the old one
    fn staging_path(&self) -> RenderResult<PathBuf> {
        let file_name = self.config_path.file_name().ok_or_else(|| {
            RenderError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("config path {} has no file name", self.config_path.display()),
            ))
        })?;
        let mut staging = file_name.to_os_string();
        staging.push(".tmp");
        Ok(self.config_path.with_file_name(staging))
    }
}

impl ConfigRenderer for HaproxyConfig {
    async fn render(&self, listeners: &[Listener], pools: &[BackendPool]) -> RenderResult<()> {
        let text = self.template.render(listeners, pools);
        let staging = self.staging_path()?;

        tokio::fs::write(&staging, text.as_bytes()).await?;
        tokio::fs::rename(&staging, &self.config_path).await?;

        tracing::info!(
            path = %self.config_path.display(),
            frontends = listeners.len(),
            backends = pools.len(),
            "haproxy config written"
        );
        Ok(())
    }

    async fn parse(&self) -> RenderResult<(Vec<Listener>, Vec<BackendPool>)> {
        let text = self.read_config().await?;
        parse_config(&text)
    }

    async fn read_config(&self) -> RenderResult<String> {
        Ok(tokio::fs::read_to_string(&self.config_path).await?)
    }

    async fn reload(&self) -> RenderResult<()> {
        run_reload_command(&self.reload_command, self.reload_timeout).await
    }
}
