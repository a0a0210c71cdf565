//! Caller-facing facade.
//!
//! [`Engine`] wires the registry, rollout manager, and metrics engine
//! together and applies the crate's availability policy: decision reads
//! never propagate collaborator failures to the end user (they fall back
//! to the default variant / excluded), event tracking is best-effort, and
//! administrative operations fail loudly and atomically.

use std::sync::Arc;

use tracing::warn;

use crate::definition::{Attributes, ExperimentDefinition, ExperimentPatch};
use crate::metrics::{
    DateRange, EventStore, ExperimentMetrics, ExperimentSummary, MemoryEventStore, MetricsEngine,
};
use crate::registry::{DefinitionStore, ExperimentRegistry, ListFilter, MemoryDefinitionStore};
use crate::resolver::resolve_variant;
use crate::rollout::{RolloutConfig, RolloutManager};
use crate::sink::EventSink;
use crate::{Error, Result};

/// Experimentation engine facade over a definition store `D` and an event
/// store `E`.
#[derive(Debug)]
pub struct Engine<D, E> {
    registry: ExperimentRegistry<D>,
    rollouts: RolloutManager,
    metrics: MetricsEngine<E>,
}

impl Engine<MemoryDefinitionStore, MemoryEventStore> {
    /// Fully in-memory engine: definitions, events, and rollout state all
    /// live in this process. The starting point for tests and hosts that
    /// hydrate state themselves.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::builder().build()
    }

    /// Create a builder with in-memory defaults.
    #[must_use]
    pub fn builder() -> EngineBuilder<MemoryDefinitionStore, MemoryEventStore> {
        EngineBuilder::default()
    }
}

impl<D: DefinitionStore, E: EventStore> Engine<D, E> {
    /// The experiment registry (administrative surface).
    pub const fn registry(&self) -> &ExperimentRegistry<D> {
        &self.registry
    }

    /// The rollout manager (administrative surface).
    pub const fn rollouts(&self) -> &RolloutManager {
        &self.rollouts
    }

    /// The metrics engine.
    pub const fn metrics_engine(&self) -> &MetricsEngine<E> {
        &self.metrics
    }

    /// Decide which variant a subject sees.
    ///
    /// Inactive, soft-deleted, or out-of-window experiments resolve to the
    /// default variant without bucketing. If the definition store is
    /// unreachable the last-known definition is used instead (fail open);
    /// the caller only sees an error when the experiment has never been
    /// seen at all or the subject id is empty.
    ///
    /// The decision is not recorded; callers log it via
    /// [`Self::track_exposure`] before presenting the variant.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] for unknown experiments, [`Error::Validation`]
    /// for an empty subject id.
    pub async fn decide(
        &self,
        experiment_key: &str,
        subject_id: &str,
        attributes: Option<&Attributes>,
    ) -> Result<String> {
        let definition = match self.registry.get_any(experiment_key).await {
            Ok(definition) => definition,
            Err(Error::CollaboratorUnavailable(reason)) => {
                match self.registry.get_cached(experiment_key) {
                    Some(cached) => {
                        warn!(experiment = %experiment_key, %reason, "definition store down, using cached definition");
                        cached
                    }
                    None => return Err(Error::not_found(experiment_key)),
                }
            }
            Err(e) => return Err(e),
        };
        Ok(self.decide_with(&definition, subject_id, attributes)?.to_string())
    }

    fn decide_with<'a>(
        &self,
        definition: &'a ExperimentDefinition,
        subject_id: &str,
        attributes: Option<&Attributes>,
    ) -> Result<&'a str> {
        if !definition.is_active()
            || definition.is_deleted()
            || !definition.is_within_window(chrono::Utc::now())
        {
            return Ok(definition.default_variant());
        }
        let empty = Attributes::new();
        resolve_variant(definition, subject_id, attributes.unwrap_or(&empty))
    }

    /// Whether a subject is included in a feature rollout.
    ///
    /// Always returns a boolean: unknown features, empty subject ids, and
    /// internal failures all resolve to excluded (fail closed).
    #[must_use]
    pub fn rollout(&self, feature_key: &str, subject_id: &str) -> bool {
        match self.rollouts.evaluate(feature_key, subject_id) {
            Ok(included) => included,
            Err(Error::NotFound(_)) => false,
            Err(e) => {
                warn!(feature = %feature_key, error = %e, "rollout evaluation failed, excluding");
                false
            }
        }
    }

    /// Record an exposure, best-effort: a failing event store is logged
    /// and swallowed so variant decisions are never blocked by analytics
    /// plumbing.
    pub async fn track_exposure(
        &self,
        experiment_key: &str,
        variant_key: &str,
        subject_id: Option<&str>,
        metadata: Option<serde_json::Value>,
    ) {
        if let Err(e) = self
            .metrics
            .track_exposure(experiment_key, variant_key, subject_id, metadata)
            .await
        {
            warn!(experiment = %experiment_key, error = %e, "exposure dropped");
        }
    }

    /// Record a conversion, best-effort. Same contract as
    /// [`Self::track_exposure`].
    pub async fn track_conversion(
        &self,
        experiment_key: &str,
        variant_key: &str,
        conversion_type: &str,
        subject_id: Option<&str>,
        value: Option<f64>,
        metadata: Option<serde_json::Value>,
    ) {
        if let Err(e) = self
            .metrics
            .track_conversion(
                experiment_key,
                variant_key,
                conversion_type,
                subject_id,
                value,
                metadata,
            )
            .await
        {
            warn!(experiment = %experiment_key, error = %e, "conversion dropped");
        }
    }

    /// Aggregate metrics for an experiment. Soft-deleted experiments stay
    /// readable so history remains attributable.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the experiment never existed; store failures
    /// propagate (this is an analytical read, not a decision path).
    pub async fn metrics(
        &self,
        experiment_key: &str,
        range: Option<DateRange>,
    ) -> Result<ExperimentMetrics> {
        let definition = self.registry.get_any(experiment_key).await?;
        self.metrics.metrics(&definition, range).await
    }

    /// Metrics plus a recommendation.
    ///
    /// # Errors
    ///
    /// Same as [`Self::metrics`].
    pub async fn summary(&self, experiment_key: &str) -> Result<ExperimentSummary> {
        let definition = self.registry.get_any(experiment_key).await?;
        self.metrics.summary(&definition).await
    }

    // Administrative passthroughs. These fail loudly; no fallback.

    /// Register a new experiment.
    ///
    /// # Errors
    ///
    /// See [`ExperimentRegistry::create`].
    pub async fn create_experiment(
        &self,
        definition: ExperimentDefinition,
    ) -> Result<ExperimentDefinition> {
        self.registry.create(definition).await
    }

    /// Apply a partial update to an experiment.
    ///
    /// # Errors
    ///
    /// See [`ExperimentRegistry::update`].
    pub async fn update_experiment(
        &self,
        key: &str,
        patch: ExperimentPatch,
        actor: &str,
    ) -> Result<ExperimentDefinition> {
        self.registry.update(key, patch, actor).await
    }

    /// List experiments matching a filter.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn list_experiments(&self, filter: ListFilter) -> Result<Vec<ExperimentDefinition>> {
        self.registry.list(filter).await
    }

    /// Flip an experiment's active flag.
    ///
    /// # Errors
    ///
    /// See [`ExperimentRegistry::set_status`].
    pub async fn set_experiment_status(
        &self,
        key: &str,
        is_active: bool,
        actor: &str,
    ) -> Result<ExperimentDefinition> {
        self.registry.set_status(key, is_active, actor).await
    }

    /// Retire an experiment (soft delete).
    ///
    /// # Errors
    ///
    /// See [`ExperimentRegistry::soft_delete`].
    pub async fn retire_experiment(
        &self,
        key: &str,
        actor: &str,
    ) -> Result<ExperimentDefinition> {
        self.registry.soft_delete(key, actor).await
    }

    /// Insert or replace a feature rollout.
    pub fn set_rollout(&self, config: RolloutConfig) {
        self.rollouts.set_rollout(config);
    }
}

/// Builder for [`Engine`], the injection point for custom stores and the
/// audit sink.
pub struct EngineBuilder<D, E> {
    definition_store: D,
    event_store: E,
    sink: Option<Arc<dyn EventSink>>,
}

impl<D: std::fmt::Debug, E: std::fmt::Debug> std::fmt::Debug for EngineBuilder<D, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("definition_store", &self.definition_store)
            .field("event_store", &self.event_store)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

impl Default for EngineBuilder<MemoryDefinitionStore, MemoryEventStore> {
    fn default() -> Self {
        Self {
            definition_store: MemoryDefinitionStore::new(),
            event_store: MemoryEventStore::new(),
            sink: None,
        }
    }
}

impl<D, E> EngineBuilder<D, E> {
    /// Swap in a definition store implementation.
    pub fn definition_store<D2: DefinitionStore>(self, store: D2) -> EngineBuilder<D2, E> {
        EngineBuilder {
            definition_store: store,
            event_store: self.event_store,
            sink: self.sink,
        }
    }

    /// Swap in an event store implementation.
    pub fn event_store<E2: EventStore>(self, store: E2) -> EngineBuilder<D, E2> {
        EngineBuilder {
            definition_store: self.definition_store,
            event_store: store,
            sink: self.sink,
        }
    }

    /// Publish rollout audit events to this sink.
    #[must_use]
    pub fn audit_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Build the engine.
    pub fn build(self) -> Engine<D, E>
    where
        D: DefinitionStore,
        E: EventStore,
    {
        let rollouts = self
            .sink
            .map_or_else(RolloutManager::new, RolloutManager::with_sink);
        Engine {
            registry: ExperimentRegistry::new(self.definition_store),
            rollouts,
            metrics: MetricsEngine::new(self.event_store),
        }
    }
}
