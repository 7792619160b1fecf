use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

pub use crate::config::models::DEFAULT_RELOAD_COMMAND;
use crate::ports::config_renderer::{RenderError, RenderResult};

/// Run `command` through `/bin/sh -c`, waiting at most `timeout` for it to exit.
///
/// The child inherits stdout/stderr. A child still running at the deadline is
/// killed.
pub async fn run_reload_command(command: &str, timeout: Duration) -> RenderResult<()> {
    tracing::info!(command, "reloading haproxy");

    let mut child = Command::new("/bin/sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| RenderError::ReloadLaunch {
            command: command.to_string(),
            source,
        })?;

    let waited = tokio::time::timeout(timeout, child.wait()).await;
    match waited {
        Ok(Ok(status)) if status.success() => {
            tracing::info!(command, "haproxy reloaded");
            Ok(())
        }
        Ok(Ok(status)) => Err(RenderError::ReloadFailed {
            command: command.to_string(),
            status: status.to_string(),
        }),
        Ok(Err(source)) => Err(RenderError::ReloadLaunch {
            command: command.to_string(),
            source,
        }),
        Err(_) => {
            if let Err(e) = child.kill().await {
                tracing::warn!(command, error = %e, "failed to kill timed out reload command");
            }
            Err(RenderError::ReloadTimeout {
                command: command.to_string(),
                timeout,
            })
        }
    }
}
