use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::core::entities::{BackendPool, Entity, Listener, Member};
use crate::core::error::{ServiceError, ServiceResult, SyncFailure};
use crate::metrics::{self, SyncTimer};
use crate::ports::{ConfigRenderer, EntityStore, StoreError, StoreResult};

/// Result of a successful save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Saved<E> {
    /// The entity as stored, with its normalized name
    pub entity: E,
    /// True when no entity of that name existed before
    pub created: bool,
}

/// Counts reported by [`SyncService::import_config`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub listeners: usize,
    pub pools: usize,
    pub skipped: usize,
}

/// Sole writer of the entity store.
///
/// Every mutation runs snapshot, apply, render, reload under one lock. When
/// rendering or reloading fails the store change is compensated; if the
/// compensation fails as well the call reports `OutOfSync`. Store writes run
/// on the blocking pool.
pub struct SyncService<S, R> {
    store: Arc<S>,
    renderer: R,
    mutation_lock: Mutex<()>,
}

impl<S: EntityStore, R: ConfigRenderer> SyncService<S, R> {
    pub fn new(store: S, renderer: R) -> Self {
        Self::with_shared_store(Arc::new(store), renderer)
    }

    /// Build on a store handle that outlives this service, e.g. across restarts.
    pub fn with_shared_store(store: Arc<S>, renderer: R) -> Self {
        Self {
            store,
            renderer,
            mutation_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn get_all<E: Entity>(&self) -> ServiceResult<Vec<E>> {
        Ok(self.store.get_all()?)
    }

    /// Exact-name lookup; names are not normalized here.
    pub fn get<E: Entity>(&self, name: &str) -> ServiceResult<Option<E>> {
        Ok(self.store.get(name)?)
    }

    pub fn members(&self, pool: &str) -> ServiceResult<Vec<Member>> {
        self.store
            .get::<BackendPool>(pool)?
            .map(|pool| pool.members)
            .ok_or_else(|| ServiceError::NotFound(format!("the backend with name {pool} does not exist")))
    }

    /// Create or replace an entity and push the new configuration to the proxy.
    pub async fn save<E: Entity>(&self, entity: E) -> ServiceResult<Saved<E>> {
        let result = async {
            let mut entity = entity;
            entity.set_name(normalize_name(entity.name())?);
            let _guard = self.mutation_lock.lock().await;
            self.save_locked(entity).await
        }
        .await;
        record_outcome::<E, _>("save", &result);
        result
    }

    /// Partial update: fields present in `patch` replace the stored ones.
    pub async fn merge<E: Entity>(&self, name: &str, patch: Value) -> ServiceResult<E> {
        let result = async {
            let _guard = self.mutation_lock.lock().await;
            let current = self.store.get::<E>(name)?.ok_or_else(|| {
                ServiceError::NotFound(format!("the {} with name {name} does not exist", E::KIND))
            })?;
            let merged = merge_fields(&current, patch)?;
            self.save_locked(merged).await.map(|saved| saved.entity)
        }
        .await;
        record_outcome::<E, _>("merge", &result);
        result
    }

    /// Remove an entity and push the new configuration to the proxy.
    pub async fn delete<E: Entity>(&self, name: &str) -> ServiceResult<()> {
        let result = async {
            let name = normalize_name(name)?;
            let _guard = self.mutation_lock.lock().await;

            let previous = self.store.get::<E>(&name)?.ok_or_else(|| {
                ServiceError::NotFound(format!("the {} to delete does not exist", E::KIND))
            })?;

            let target = name.clone();
            self.write(move |store| store.delete::<E>(&target)).await?;
            tracing::debug!(kind = %E::KIND, name = %name, "entity deleted, syncing haproxy");

            self.synchronize(move |store| store.save(&previous)).await
        }
        .await;
        record_outcome::<E, _>("delete", &result);
        result
    }

    /// Reload the proxy without touching the store or the file.
    pub async fn reload_proxy(&self) -> ServiceResult<()> {
        let _guard = self.mutation_lock.lock().await;
        let reloaded = self.renderer.reload().await;
        metrics::increment_reload_total(reloaded.is_ok());
        reloaded.map_err(|e| ServiceError::Sync(SyncFailure::Reload(e)))
    }

    pub async fn read_config(&self) -> ServiceResult<String> {
        self.renderer
            .read_config()
            .await
            .map_err(|e| ServiceError::Unknown(e.to_string()))
    }

    /// Seed the store from the entities found in the current configuration
    /// file. Names that already exist in the store are left untouched.
    pub async fn import_config(&self) -> ServiceResult<ImportSummary> {
        let _guard = self.mutation_lock.lock().await;
        let (listeners, pools) = self
            .renderer
            .parse()
            .await
            .map_err(|e| ServiceError::BadData(e.to_string()))?;

        let mut summary = ImportSummary::default();
        for listener in listeners {
            if self.import_one(listener).await? {
                summary.listeners += 1;
            } else {
                summary.skipped += 1;
            }
        }
        for pool in pools {
            if self.import_one(pool).await? {
                summary.pools += 1;
            } else {
                summary.skipped += 1;
            }
        }

        tracing::info!(
            listeners = summary.listeners,
            pools = summary.pools,
            skipped = summary.skipped,
            "imported entities from haproxy config"
        );
        Ok(summary)
    }

    async fn import_one<E: Entity>(&self, mut entity: E) -> ServiceResult<bool> {
        entity.set_name(normalize_name(entity.name())?);
        if self.store.get::<E>(entity.name())?.is_some() {
            tracing::debug!(kind = %E::KIND, name = %entity.name(), "already stored, skipping import");
            return Ok(false);
        }
        self.write(move |store| store.save(&entity)).await?;
        Ok(true)
    }

    async fn save_locked<E: Entity>(&self, entity: E) -> ServiceResult<Saved<E>> {
        entity
            .validate()
            .map_err(|reason| ServiceError::BadData(format!("the {} data is invalid: {reason}", E::KIND)))?;

        let previous = self.store.get::<E>(entity.name())?;
        let created = previous.is_none();
        let staged = entity.clone();
        self.write(move |store| store.save(&staged)).await?;
        tracing::debug!(kind = %E::KIND, name = %entity.name(), "entity saved, syncing haproxy");

        match previous {
            Some(old) => self.synchronize(move |store| store.save(&old)).await?,
            None => {
                let name = entity.name().to_string();
                self.synchronize(move |store| store.delete::<E>(&name)).await?
            }
        }

        Ok(Saved { entity, created })
    }

    async fn write<F>(&self, op: F) -> StoreResult<()>
    where
        F: FnOnce(&S) -> StoreResult<()> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| StoreError::Engine(format!("store task failed: {e}")))?
    }

    async fn synchronize<F>(&self, rollback: F) -> ServiceResult<()>
    where
        F: FnOnce(&S) -> StoreResult<()> + Send + 'static,
    {
        let failure = match self.render_and_reload().await {
            Ok(()) => return Ok(()),
            Err(failure) => failure,
        };

        tracing::warn!(error = %failure, "haproxy sync failed, rolling back store change");
        if let Err(rollback_err) = self.write(rollback).await {
            tracing::error!(
                error = %failure,
                rollback_error = %rollback_err,
                "rollback failed, haproxy config and store are OUT OF SYNC"
            );
            return Err(ServiceError::OutOfSync {
                cause: failure,
                rollback: rollback_err,
            });
        }

        if failure.file_written() {
            if let Err(e) = self.render_current().await {
                tracing::warn!(error = %e, "failed to restore haproxy config after rollback");
            }
        }

        Err(ServiceError::Sync(failure))
    }

    async fn render_and_reload(&self) -> Result<(), SyncFailure> {
        let _timer = SyncTimer::new();
        self.render_current().await?;

        let reloaded = self.renderer.reload().await;
        metrics::increment_reload_total(reloaded.is_ok());
        reloaded.map_err(SyncFailure::Reload)
    }

    async fn render_current(&self) -> Result<(), SyncFailure> {
        let listeners = self.store.get_all::<Listener>().map_err(SyncFailure::Read)?;
        let pools = self.store.get_all::<BackendPool>().map_err(SyncFailure::Read)?;
        self.renderer
            .render(&listeners, &pools)
            .await
            .map_err(SyncFailure::Render)
    }
}

/// Names are the only identity: empty names are rejected, spaces become underscores.
pub fn normalize_name(name: &str) -> ServiceResult<String> {
    if name.is_empty() {
        return Err(ServiceError::BadData("Name is required".to_string()));
    }
    Ok(name.replace(' ', "_"))
}

fn merge_fields<E: Entity>(current: &E, patch: Value) -> ServiceResult<E> {
    let Value::Object(fields) = patch else {
        return Err(ServiceError::BadData(format!("the {} data is invalid", E::KIND)));
    };

    let mut value = serde_json::to_value(current).map_err(|e| ServiceError::Unknown(e.to_string()))?;
    if let Value::Object(stored) = &mut value {
        stored.extend(fields);
    }

    let mut merged: E = serde_json::from_value(value)
        .map_err(|e| ServiceError::BadData(format!("the {} data is invalid: {e}", E::KIND)))?;
    merged.set_name(current.name().to_string());
    Ok(merged)
}

fn record_outcome<E: Entity, T>(operation: &'static str, result: &ServiceResult<T>) {
    let outcome = match result {
        Ok(_) => "success",
        Err(e) => e.kind().as_str(),
    };
    metrics::increment_mutation_total(E::KIND, operation, outcome);
}
