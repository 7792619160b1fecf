pub mod entities;
pub mod error;
pub mod sync_service;

pub use entities::{BackendPool, Entity, EntityKind, Listener, Member};
pub use error::{ErrorKind, ServiceError, ServiceResult, SyncFailure};
pub use sync_service::{ImportSummary, Saved, SyncService, normalize_name};
