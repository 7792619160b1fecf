use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::core::entities::{BackendPool, Listener};

/// Error type for configuration rendering and proxy reloads
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RenderError {
    /// Error reading or writing the configuration file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error when the generation template is unusable
    #[error("Invalid template: {0}")]
    Template(String),

    /// Error when the configuration file cannot be read back into entities
    #[error("haproxy config file is invalid - could not read members for backend {backend}: {reason}")]
    Format {
        /// The backend whose block is malformed
        backend: String,
        reason: String,
    },

    /// Error when the reload command could not be started
    #[error("Failed to launch reload command '{command}': {source}")]
    ReloadLaunch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Error when the reload command exits unsuccessfully
    #[error("Reload command '{command}' failed with {status}")]
    ReloadFailed { command: String, status: String },

    /// Error when the reload command does not finish in time
    #[error("Reload command '{command}' timed out after {timeout:?}")]
    ReloadTimeout { command: String, timeout: Duration },
}

/// Result type for renderer operations
pub type RenderResult<T> = Result<T, RenderError>;

/// ConfigRenderer defines the port (interface) between structured entities and
/// the proxy's text configuration.
pub trait ConfigRenderer: Send + Sync + 'static {
    /// Regenerate the whole configuration file from the complete entity set.
    ///
    /// # Arguments
    /// * `listeners` - Every stored listener
    /// * `pools` - Every stored backend pool
    fn render(
        &self,
        listeners: &[Listener],
        pools: &[BackendPool],
    ) -> impl Future<Output = RenderResult<()>> + Send;

    /// Read the current configuration file back into entities. Lossy.
    fn parse(&self) -> impl Future<Output = RenderResult<(Vec<Listener>, Vec<BackendPool>)>> + Send;

    /// Raw contents of the current configuration file.
    fn read_config(&self) -> impl Future<Output = RenderResult<String>> + Send;

    /// Make the running proxy re-read its configuration file.
    fn reload(&self) -> impl Future<Output = RenderResult<()>> + Send;
}
