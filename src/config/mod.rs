pub mod loader;
pub mod models;
pub mod validation;

pub use loader::{ConfigError, ConfigResult, load_config, resolve_config};
pub use models::{AppConfig, ConfigOverrides, LogFormat};
pub use validation::{ConfigValidator, ValidationError};
