use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use axum::Router;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::adapters::http::handlers::{self, AdminService, AppState};
use crate::core::entities::{BackendPool, Listener};
use crate::utils::graceful_shutdown::{GracefulShutdown, ShutdownReason};

/// The admin REST API in front of the sync service.
pub struct AdminServer {
    port: u16,
    state: AppState,
}

impl AdminServer {
    pub fn new(
        port: u16,
        service: Arc<AdminService>,
        shutdown: Arc<GracefulShutdown>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            port,
            state: AppState {
                service,
                shutdown,
                metrics,
            },
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Serve until a stop or restart is requested, then drain and return why.
    pub async fn run(self) -> Result<ShutdownReason> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind to address: {addr}"))?;
        tracing::info!(%addr, "admin api listening");

        self.serve(listener).await
    }

    /// Serve on an already bound listener; see [`AdminServer::run`].
    pub async fn serve(self, listener: TcpListener) -> Result<ShutdownReason> {
        let shutdown = self.state.shutdown.clone();
        let mut stop = shutdown.shutdown_token();
        let app = self.router();

        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    stop.cancelled().await;
                })
                .await
        });

        let mut token = shutdown.shutdown_token();
        let reason = tokio::select! {
            joined = &mut server => {
                joined
                    .context("admin server task failed")?
                    .map_err(|e| anyhow!("HTTP Server error: {e}"))?;
                return Ok(ShutdownReason::Force);
            }
            reason = token.cancelled() => reason,
        };

        tracing::info!(?reason, "draining admin api");
        match tokio::time::timeout(shutdown.drain_timeout(), &mut server).await {
            Ok(joined) => joined
                .context("admin server task failed")?
                .map_err(|e| anyhow!("HTTP Server error: {e}"))?,
            Err(_) => {
                tracing::warn!(
                    timeout = ?shutdown.drain_timeout(),
                    "drain timeout exceeded, dropping open connections"
                );
                server.abort();
            }
        }

        Ok(reason)
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(handlers::status))
        .route("/metrics", get(handlers::metrics))
        .route("/restart", get(handlers::restart))
        .route("/haproxy/config", get(handlers::haproxy_config))
        .route("/haproxy/reload", get(handlers::reload))
        .route(
            "/frontends",
            get(handlers::list::<Listener>).put(handlers::put::<Listener>),
        )
        .route(
            "/frontends/{name}",
            get(handlers::get_one::<Listener>)
                .put(handlers::put_named::<Listener>)
                .post(handlers::post::<Listener>)
                .delete(handlers::delete::<Listener>),
        )
        .route(
            "/backends",
            get(handlers::list::<BackendPool>).put(handlers::put::<BackendPool>),
        )
        .route(
            "/backends/{name}",
            get(handlers::get_one::<BackendPool>)
                .put(handlers::put_named::<BackendPool>)
                .post(handlers::post::<BackendPool>)
                .delete(handlers::delete::<BackendPool>),
        )
        .route("/backends/{name}/members", get(handlers::members))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
