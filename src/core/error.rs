use std::fmt;
use thiserror::Error;

use crate::ports::{RenderError, StoreError};

/// Coarse classification of a failed service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadData,
    NotFound,
    Storage,
    Sync,
    OutOfSync,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BadData => "bad_data",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Storage => "storage",
            ErrorKind::Sync => "sync",
            ErrorKind::OutOfSync => "out_of_sync",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The step of a synchronization that failed.
#[derive(Error, Debug)]
pub enum SyncFailure {
    #[error("failed to read entities for rendering: {0}")]
    Read(#[source] StoreError),

    #[error("failed to render haproxy config: {0}")]
    Render(#[source] RenderError),

    #[error("failed to reload haproxy: {0}")]
    Reload(#[source] RenderError),
}

impl SyncFailure {
    /// Whether the configuration file may already hold the rejected change.
    pub fn file_written(&self) -> bool {
        matches!(self, SyncFailure::Reload(_))
    }
}

/// Errors surfaced by the synchronization service.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ServiceError {
    #[error("{0}")]
    BadData(String),

    #[error("{0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// The store was rolled back; the requested change was not applied.
    #[error("haproxy sync failed and the change has been rolled back: {0}")]
    Sync(#[source] SyncFailure),

    /// The rollback failed too; store and configuration file disagree.
    #[error("haproxy config is out of sync with the store ({cause}); rollback failed: {rollback}")]
    OutOfSync {
        cause: SyncFailure,
        #[source]
        rollback: StoreError,
    },

    #[error("unexpected error: {0}")]
    Unknown(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::BadData(_) => ErrorKind::BadData,
            ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::Storage(_) => ErrorKind::Storage,
            ServiceError::Sync(_) => ErrorKind::Sync,
            ServiceError::OutOfSync { .. } => ErrorKind::OutOfSync,
            ServiceError::Unknown(_) => ErrorKind::Unknown,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
