//! Definition store boundary and the in-memory reference backend.

use std::future::Future;

use dashmap::DashMap;

use crate::definition::ExperimentDefinition;
use crate::Result;

/// Filter for listing experiment definitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListFilter {
    /// Restrict to a given active state when set.
    pub is_active: Option<bool>,
    /// Include soft-deleted definitions (off by default).
    pub include_deleted: bool,
}

impl ListFilter {
    /// Match everything that is not soft-deleted.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            is_active: None,
            include_deleted: false,
        }
    }

    /// Match only active, non-deleted definitions.
    #[must_use]
    pub const fn active() -> Self {
        Self {
            is_active: Some(true),
            include_deleted: false,
        }
    }

    pub(crate) fn accepts(&self, definition: &ExperimentDefinition) -> bool {
        if !self.include_deleted && definition.is_deleted() {
            return false;
        }
        self.is_active
            .map_or(true, |active| definition.is_active() == active)
    }
}

/// Durable CRUD boundary for experiment definitions, keyed by experiment
/// key with a uniqueness constraint.
///
/// No storage technology is assumed; implementations back this with a
/// document database, SQL table, file, or the in-memory
/// [`MemoryDefinitionStore`]. Methods return futures so hosts can bound
/// them with deadlines and cancel by dropping.
pub trait DefinitionStore: Send + Sync {
    /// Fetch a definition by key, soft-deleted ones included.
    ///
    /// # Errors
    ///
    /// [`crate::Error::CollaboratorUnavailable`] when the backing store is
    /// unreachable.
    fn get(&self, key: &str)
        -> impl Future<Output = Result<Option<ExperimentDefinition>>> + Send;

    /// Insert or replace a definition under its key.
    ///
    /// # Errors
    ///
    /// [`crate::Error::CollaboratorUnavailable`] when the backing store is
    /// unreachable.
    fn put(&self, definition: ExperimentDefinition) -> impl Future<Output = Result<()>> + Send;

    /// List definitions matching the filter.
    ///
    /// # Errors
    ///
    /// [`crate::Error::CollaboratorUnavailable`] when the backing store is
    /// unreachable.
    fn list(
        &self,
        filter: ListFilter,
    ) -> impl Future<Output = Result<Vec<ExperimentDefinition>>> + Send;
}

/// In-memory definition store over a concurrent map.
///
/// The default backend: definitions are lost on process restart. Suitable
/// for tests and for hosts that hydrate definitions from elsewhere at
/// startup.
#[derive(Debug, Default)]
pub struct MemoryDefinitionStore {
    definitions: DashMap<String, ExperimentDefinition>,
}

impl MemoryDefinitionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored definitions, soft-deleted ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the store holds no definitions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl DefinitionStore for MemoryDefinitionStore {
    async fn get(&self, key: &str) -> Result<Option<ExperimentDefinition>> {
        Ok(self.definitions.get(key).map(|d| d.clone()))
    }

    async fn put(&self, definition: ExperimentDefinition) -> Result<()> {
        self.definitions
            .insert(definition.key().to_string(), definition);
        Ok(())
    }

    async fn list(&self, filter: ListFilter) -> Result<Vec<ExperimentDefinition>> {
        Ok(self
            .definitions
            .iter()
            .filter(|entry| filter.accepts(entry.value()))
            .map(|entry| entry.clone())
            .collect())
    }
}
