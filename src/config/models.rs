use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_HAPROXY_CONFIG: &str = "/etc/haproxy/haproxy.cfg";
pub const DEFAULT_RELOAD_COMMAND: &str = "service haproxy reload";
pub const DEFAULT_DB_PATH: &str = "/var/db/conduit";
pub const DEFAULT_RELOAD_TIMEOUT_SECS: u64 = 30;

/// Application settings, as read from the settings file.
///
/// Every field has a default, so a settings file only needs the keys it
/// changes.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// Port the admin API listens on.
    pub port: u16,
    /// Path of the rendered haproxy config file.
    #[serde(rename = "haconfig")]
    pub haproxy_config_path: PathBuf,
    /// Generation template; the built-in template is used when unset.
    #[serde(rename = "hatemplate")]
    pub haproxy_template_path: Option<PathBuf>,
    /// Shell command that makes haproxy re-read its config.
    #[serde(rename = "hareload")]
    pub reload_command: String,
    /// Directory holding the entity store.
    #[serde(rename = "db-path")]
    pub db_path: PathBuf,
    #[serde(rename = "reload-timeout-secs")]
    pub reload_timeout_secs: u64,
    #[serde(rename = "log-format")]
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            haproxy_config_path: PathBuf::from(DEFAULT_HAPROXY_CONFIG),
            haproxy_template_path: None,
            reload_command: DEFAULT_RELOAD_COMMAND.to_string(),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            reload_timeout_secs: DEFAULT_RELOAD_TIMEOUT_SECS,
            log_format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    pub fn reload_timeout(&self) -> Duration {
        Duration::from_secs(self.reload_timeout_secs)
    }

    /// Apply command-line overrides on top of the loaded settings.
    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(path) = &overrides.haproxy_config_path {
            self.haproxy_config_path = path.clone();
        }
        if let Some(path) = &overrides.haproxy_template_path {
            self.haproxy_template_path = Some(path.clone());
        }
        if let Some(command) = &overrides.reload_command {
            self.reload_command = command.clone();
        }
        if let Some(path) = &overrides.db_path {
            self.db_path = path.clone();
        }
        if let Some(secs) = overrides.reload_timeout_secs {
            self.reload_timeout_secs = secs;
        }
        if let Some(format) = overrides.log_format {
            self.log_format = format;
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Values given on the command line; `None` leaves the setting untouched.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub haproxy_config_path: Option<PathBuf>,
    pub haproxy_template_path: Option<PathBuf>,
    pub reload_command: Option<String>,
    pub db_path: Option<PathBuf>,
    pub reload_timeout_secs: Option<u64>,
    pub log_format: Option<LogFormat>,
}
