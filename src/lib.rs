//! Conduit - keeps an HAProxy configuration in sync with a durable entity store
//!
//! Frontends and backends are stored in an embedded database; every change
//! re-renders the complete HAProxy config file and reloads the proxy, and is
//! rolled back when that fails.

// Re-export public modules with explicit visibility controls
pub mod config;
pub mod metrics;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

// These modules are implementation details and should not be directly used by users
pub(crate) mod adapters;
pub(crate) mod core;

// Re-export the specific types needed by the binary crate and integration tests
pub use crate::adapters::haproxy::{ConfigTemplate, HaproxyConfig, parse_config};
pub use crate::adapters::http::{AdminServer, AdminService, AppState, build_router};
pub use crate::adapters::redb_store::RedbStore;
pub use crate::core::{
    BackendPool, Entity, EntityKind, ErrorKind, ImportSummary, Listener, Member, Saved,
    ServiceError, ServiceResult, SyncFailure, SyncService, normalize_name,
};
pub use crate::utils::graceful_shutdown::{GracefulShutdown, ShutdownReason, ShutdownToken};
