//! Experiment registry: lifecycle store and validator for definitions.
//!
//! All definition mutation flows through [`ExperimentRegistry`], which
//! re-checks the schema invariants on every write, stamps attribution
//! itself, and never commits a partial update. Reads are cached in a
//! read-through map so decision paths can fall back to the last-known
//! definition when the backing store is unreachable.

mod store;

pub use store::{DefinitionStore, ListFilter, MemoryDefinitionStore};

use chrono::Utc;
use dashmap::DashMap;
use tracing::info;

use crate::definition::{ExperimentDefinition, ExperimentPatch};
use crate::{Error, Result};

/// Lifecycle controller for experiment definitions over a
/// [`DefinitionStore`].
#[derive(Debug)]
pub struct ExperimentRegistry<S> {
    store: S,
    // Last-known-good definitions for fail-open decision reads.
    cache: DashMap<String, ExperimentDefinition>,
}

impl<S: DefinitionStore> ExperimentRegistry<S> {
    /// Create a registry over the given store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: DashMap::new(),
        }
    }

    /// Register a new experiment definition.
    ///
    /// The key must never have been used before: a soft-deleted definition
    /// still owns its key so that historical events stay attributable.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] if the key is already taken or the definition
    /// violates its invariants; [`Error::CollaboratorUnavailable`] if the
    /// store is unreachable. Nothing is written on error.
    pub async fn create(&self, definition: ExperimentDefinition) -> Result<ExperimentDefinition> {
        definition.validate()?;
        if self.store.get(definition.key()).await?.is_some() {
            return Err(Error::validation(format!(
                "experiment key '{}' already exists",
                definition.key()
            )));
        }
        self.store.put(definition.clone()).await?;
        self.cache
            .insert(definition.key().to_string(), definition.clone());
        info!(experiment = %definition.key(), by = %definition.created_by(), "experiment created");
        Ok(definition)
    }

    /// Apply a partial update, validating the merged result before any
    /// write. Attribution (`updated_by`/`updated_at`) is stamped here, not
    /// by the caller.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the key is unknown or soft-deleted;
    /// [`Error::Validation`] if the merged definition violates an
    /// invariant. No partial write occurs on error.
    pub async fn update(
        &self,
        key: &str,
        patch: ExperimentPatch,
        actor: &str,
    ) -> Result<ExperimentDefinition> {
        let mut merged = self.require_live(key).await?;
        merged.apply(patch);
        merged.validate()?;
        merged.stamp_update(actor, Utc::now());
        self.store.put(merged.clone()).await?;
        self.cache.insert(key.to_string(), merged.clone());
        info!(experiment = %key, by = %actor, "experiment updated");
        Ok(merged)
    }

    /// Fetch a live (non-deleted) definition.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the key is unknown or soft-deleted.
    pub async fn get(&self, key: &str) -> Result<ExperimentDefinition> {
        let definition = self.require_live(key).await?;
        self.cache.insert(key.to_string(), definition.clone());
        Ok(definition)
    }

    /// Fetch a definition regardless of deletion state. Metrics use this
    /// so retired experiments keep their history readable.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the key has never existed.
    pub async fn get_any(&self, key: &str) -> Result<ExperimentDefinition> {
        let definition = self
            .store
            .get(key)
            .await?
            .ok_or_else(|| Error::not_found(key))?;
        self.cache.insert(key.to_string(), definition.clone());
        Ok(definition)
    }

    /// Last definition this registry successfully read or wrote for `key`,
    /// served without touching the store. The fail-open path for decision
    /// reads when the store is down.
    #[must_use]
    pub fn get_cached(&self, key: &str) -> Option<ExperimentDefinition> {
        self.cache.get(key).map(|d| d.clone())
    }

    /// List definitions matching the filter.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn list(&self, filter: ListFilter) -> Result<Vec<ExperimentDefinition>> {
        self.store.list(filter).await
    }

    /// Flip the active flag.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the key is unknown or soft-deleted.
    pub async fn set_status(
        &self,
        key: &str,
        is_active: bool,
        actor: &str,
    ) -> Result<ExperimentDefinition> {
        let mut definition = self.require_live(key).await?;
        definition.set_active(is_active);
        definition.stamp_update(actor, Utc::now());
        self.store.put(definition.clone()).await?;
        self.cache.insert(key.to_string(), definition.clone());
        info!(experiment = %key, is_active, by = %actor, "experiment status changed");
        Ok(definition)
    }

    /// Retire a definition: clears the active flag and stamps
    /// `deleted_at`/`deleted_by`. The row is never physically removed, so
    /// exposure and conversion history stays attributable.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the key is unknown or already soft-deleted.
    pub async fn soft_delete(&self, key: &str, actor: &str) -> Result<ExperimentDefinition> {
        let mut definition = self.require_live(key).await?;
        definition.mark_deleted(actor, Utc::now());
        self.store.put(definition.clone()).await?;
        self.cache.insert(key.to_string(), definition.clone());
        info!(experiment = %key, by = %actor, "experiment soft-deleted");
        Ok(definition)
    }

    async fn require_live(&self, key: &str) -> Result<ExperimentDefinition> {
        let definition = self
            .store
            .get(key)
            .await?
            .ok_or_else(|| Error::not_found(key))?;
        if definition.is_deleted() {
            return Err(Error::not_found(key));
        }
        Ok(definition)
    }
}
