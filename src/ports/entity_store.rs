use thiserror::Error;

use crate::core::entities::Entity;

/// Error type for entity store operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StoreError {
    /// Error raised by the storage engine while reading or writing
    #[error("storage engine error: {0}")]
    Engine(String),

    /// Error when a stored value cannot be encoded or decoded
    #[error("failed to encode entity '{key}': {source}")]
    Encoding {
        /// The composite key of the offending record
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Error when the store location cannot be prepared
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<redb::Error> for StoreError {
    fn from(err: redb::Error) -> Self {
        StoreError::Engine(err.to_string())
    }
}

/// Result type for entity store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// EntityStore defines the port (interface) for durable entity persistence.
///
/// Every call goes straight to the underlying engine; implementations must be
/// safe to share between concurrent callers.
pub trait EntityStore: Send + Sync + 'static {
    /// All entities of kind `E`, in key order. Empty when none exist.
    fn get_all<E: Entity>(&self) -> StoreResult<Vec<E>>;

    /// The entity of kind `E` with this exact name, or `None`.
    fn get<E: Entity>(&self, name: &str) -> StoreResult<Option<E>>;

    /// Insert or overwrite the entity under its name.
    fn save<E: Entity>(&self, entity: &E) -> StoreResult<()>;

    /// Remove the entity of kind `E` with this name. Missing names are a no-op.
    fn delete<E: Entity>(&self, name: &str) -> StoreResult<()>;
}
