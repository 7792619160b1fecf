use redb::{Database, ReadableTable, TableDefinition};
use std::path::{Path, PathBuf};

use crate::core::entities::Entity;
use crate::ports::entity_store::{EntityStore, StoreError, StoreResult};

/// Entities keyed by `{kind}/{name}`, values are JSON-serialized entities.
const ENTITIES: TableDefinition<&str, &[u8]> = TableDefinition::new("entities");

/// File created inside the configured store directory.
pub const DATABASE_FILE: &str = "conduit.redb";

/// An entity store backed by an embedded redb database.
///
/// The handle is opened once at startup and shared; dropping it (or calling
/// [`RedbStore::close`]) releases the database file.
pub struct RedbStore {
    db: Database,
    path: PathBuf,
}

impl RedbStore {
    /// Open the store in `dir`, creating the directory and database if absent.
    pub fn open<P: AsRef<Path>>(dir: P) -> StoreResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(DATABASE_FILE);

        let db = Database::create(&path).map_err(redb::Error::from)?;

        // Create the table up front so read transactions never see it missing
        let txn = db.begin_write().map_err(redb::Error::from)?;
        txn.open_table(ENTITIES).map_err(redb::Error::from)?;
        txn.commit().map_err(redb::Error::from)?;

        tracing::info!(path = %path.display(), "entity store opened");
        Ok(Self { db, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn close(self) {
        tracing::info!(path = %self.path.display(), "entity store closed");
    }

    fn decode<E: Entity>(key: &str, bytes: &[u8]) -> StoreResult<E> {
        serde_json::from_slice(bytes).map_err(|source| StoreError::Encoding {
            key: key.to_string(),
            source,
        })
    }
}

impl EntityStore for RedbStore {
    fn get_all<E: Entity>(&self) -> StoreResult<Vec<E>> {
        let prefix = E::KIND.key_prefix();
        let txn = self.db.begin_read().map_err(redb::Error::from)?;
        let table = txn.open_table(ENTITIES).map_err(redb::Error::from)?;

        let mut results = Vec::new();
        for item in table.range(prefix..).map_err(redb::Error::from)? {
            let (key, value) = item.map_err(redb::Error::from)?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            results.push(Self::decode(key, value.value())?);
        }
        Ok(results)
    }

    fn get<E: Entity>(&self, name: &str) -> StoreResult<Option<E>> {
        let key = E::KIND.key(name);
        let txn = self.db.begin_read().map_err(redb::Error::from)?;
        let table = txn.open_table(ENTITIES).map_err(redb::Error::from)?;

        match table.get(key.as_str()).map_err(redb::Error::from)? {
            Some(value) => Ok(Some(Self::decode(&key, value.value())?)),
            None => Ok(None),
        }
    }

    fn save<E: Entity>(&self, entity: &E) -> StoreResult<()> {
        let key = E::KIND.key(entity.name());
        let bytes = serde_json::to_vec(entity).map_err(|source| StoreError::Encoding {
            key: key.clone(),
            source,
        })?;

        let txn = self.db.begin_write().map_err(redb::Error::from)?;
        {
            let mut table = txn.open_table(ENTITIES).map_err(redb::Error::from)?;
            table
                .insert(key.as_str(), bytes.as_slice())
                .map_err(redb::Error::from)?;
        }
        txn.commit().map_err(redb::Error::from)?;
        Ok(())
    }

    fn delete<E: Entity>(&self, name: &str) -> StoreResult<()> {
        let key = E::KIND.key(name);
        let txn = self.db.begin_write().map_err(redb::Error::from)?;
        {
            let mut table = txn.open_table(ENTITIES).map_err(redb::Error::from)?;
            table.remove(key.as_str()).map_err(redb::Error::from)?;
        }
        txn.commit().map_err(redb::Error::from)?;
        Ok(())
    }
}
