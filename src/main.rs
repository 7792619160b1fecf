use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;

use conduit::config::{AppConfig, ConfigOverrides, LogFormat, resolve_config};
use conduit::{
    AdminServer, GracefulShutdown, HaproxyConfig, RedbStore, ShutdownReason, SyncService,
    metrics, tracing_setup,
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Settings file (YAML or JSON)
    #[clap(short = 'f', long)]
    config: Option<PathBuf>,

    /// Port the admin API listens on
    #[clap(long)]
    port: Option<u16>,

    /// Path of the haproxy config file to manage
    #[clap(long)]
    haconfig: Option<PathBuf>,

    /// Template the haproxy config is generated from
    #[clap(long)]
    hatemplate: Option<PathBuf>,

    /// Command that reloads haproxy
    #[clap(long)]
    hareload: Option<String>,

    /// Directory of the entity store
    #[clap(long)]
    db_path: Option<PathBuf>,

    /// Seconds to wait for the reload command
    #[clap(long)]
    reload_timeout_secs: Option<u64>,

    #[clap(long, value_enum)]
    log_format: Option<LogFormat>,

    /// Seed the store from the existing haproxy config before serving
    #[clap(long)]
    import_existing: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            port: self.port,
            haproxy_config_path: self.haconfig.clone(),
            haproxy_template_path: self.hatemplate.clone(),
            reload_command: self.hareload.clone(),
            db_path: self.db_path.clone(),
            reload_timeout_secs: self.reload_timeout_secs,
            log_format: self.log_format,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let overrides = args.overrides();

    let mut config = resolve_config(args.config.as_deref(), &overrides)
        .await
        .context("Failed to load settings")?;

    tracing_setup::init_tracing(config.log_format)
        .map_err(|e| anyhow!("Failed to initialize tracing: {e}"))?;

    let metrics_handle = metrics::install_recorder().context("Failed to install metrics recorder")?;

    // Opened once for every cycle; the database file stays locked while any
    // handle lives, including ones held by connections a drain gave up on
    let store = Arc::new(
        RedbStore::open(&config.db_path)
            .with_context(|| format!("Failed to open entity store in {}", config.db_path.display()))?,
    );

    let mut import = args.import_existing;
    loop {
        let reason = run(&config, store.clone(), metrics_handle.clone(), import).await?;
        import = false;

        match reason {
            ShutdownReason::Restart => {
                tracing::info!("restarting, re-reading settings");
                config = match resolve_config(args.config.as_deref(), &overrides).await {
                    Ok(next) => {
                        if next.db_path != config.db_path {
                            tracing::warn!(
                                current = %config.db_path.display(),
                                requested = %next.db_path.display(),
                                "db-path changes need a full stop, keeping the open store"
                            );
                        }
                        next
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "new settings are invalid, keeping the previous ones");
                        config
                    }
                };
            }
            ShutdownReason::Graceful | ShutdownReason::Force => break,
        }
    }

    match Arc::try_unwrap(store) {
        Ok(store) => store.close(),
        Err(_) => tracing::warn!("entity store still in use, closing on drop"),
    }

    tracing::info!("conduit stopped");
    Ok(())
}

/// One serving cycle on the shared store: serve until stopped or restarted.
async fn run(
    config: &AppConfig,
    store: Arc<RedbStore>,
    metrics_handle: PrometheusHandle,
    import: bool,
) -> Result<ShutdownReason> {
    let haproxy = HaproxyConfig::from_config(config)
        .await
        .context("Failed to load haproxy template")?;
    let service = Arc::new(SyncService::with_shared_store(store, haproxy));

    if import {
        let summary = service
            .import_config()
            .await
            .context("Failed to import the existing haproxy config")?;
        tracing::info!(?summary, "existing haproxy config imported");
    }

    let shutdown = Arc::new(GracefulShutdown::new());
    let signal_task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = shutdown.run_signal_handler().await {
                tracing::error!(error = %e, "signal handler failed");
            }
        })
    };

    let server = AdminServer::new(config.port, service, shutdown, Some(metrics_handle));
    let served = server.run().await;
    signal_task.abort();
    served
}
