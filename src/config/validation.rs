use std::path::Path;
use thiserror::Error;

use crate::config::models::AppConfig;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Configuration validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Checks settings before anything is opened, reporting every problem at once.
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &AppConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if config.port == 0 {
            errors.push(ValidationError::InvalidField {
                field: "port".to_string(),
                message: "Port must be between 1 and 65535".to_string(),
            });
        }

        if let Err(e) = Self::require_path("haconfig", &config.haproxy_config_path) {
            errors.push(e);
        }
        if let Err(e) = Self::require_path("db-path", &config.db_path) {
            errors.push(e);
        }

        if config.reload_command.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "hareload".to_string(),
            });
        }

        if config.reload_timeout_secs == 0 {
            errors.push(ValidationError::InvalidField {
                field: "reload-timeout-secs".to_string(),
                message: "Reload timeout must be at least one second".to_string(),
            });
        }

        if let Some(template) = &config.haproxy_template_path {
            if !template.is_file() {
                errors.push(ValidationError::FileNotFound {
                    path: template.display().to_string(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    fn require_path(field: &str, path: &Path) -> ValidationResult<()> {
        if path.as_os_str().is_empty() {
            return Err(ValidationError::MissingField {
                field: field.to_string(),
            });
        }
        Ok(())
    }

    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        let mut message = format!("Found {} validation error(s):\n", errors.len());
        for (i, error) in errors.iter().enumerate() {
            message.push_str(&format!("  {}. {}\n", i + 1, error));
        }
        message
    }
}
