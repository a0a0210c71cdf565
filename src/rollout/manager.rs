//! Process-scoped rollout registry.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, warn};

use crate::sink::{AuditEvent, AuditKind, EventSink, NoopEventSink};
use crate::{Error, Result};

use super::{evaluator, validate_percentage, RolloutConfig};

/// Controller holding one [`RolloutConfig`] per feature key.
///
/// The map is process-scoped: nothing here persists across restarts unless
/// the host wires [`Self::snapshot`] / [`Self::restore`] to storage of its
/// own. Mutations are serialized per key through the map's entry guards,
/// so concurrent increase/decrease calls on the same feature cannot lose
/// updates; reads evaluate against a snapshot of the current config.
///
/// Every accepted mutation publishes an [`AuditEvent`] to the injected
/// [`EventSink`]. Publish failures are logged and swallowed: auditing
/// never blocks a rollout change.
pub struct RolloutManager {
    configs: DashMap<String, RolloutConfig>,
    sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for RolloutManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RolloutManager")
            .field("features", &self.configs.len())
            .finish_non_exhaustive()
    }
}

impl Default for RolloutManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RolloutManager {
    /// Create a manager that discards audit events.
    #[must_use]
    pub fn new() -> Self {
        Self::with_sink(Arc::new(NoopEventSink))
    }

    /// Create a manager publishing audit events to `sink`.
    #[must_use]
    pub fn with_sink(sink: Arc<dyn EventSink>) -> Self {
        Self {
            configs: DashMap::new(),
            sink,
        }
    }

    /// Number of features under management.
    #[must_use]
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    /// Whether no features are under management.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Snapshot of the config for one feature.
    #[must_use]
    pub fn get(&self, feature_key: &str) -> Option<RolloutConfig> {
        self.configs.get(feature_key).map(|c| c.clone())
    }

    /// Insert or replace a feature's config. This is the only operation
    /// that creates entries; the guarded mutations below never fabricate
    /// configs for unknown keys.
    pub fn set_rollout(&self, config: RolloutConfig) {
        let key = config.feature_key().to_string();
        let new_pct = config.percentage();
        let previous = self.configs.insert(key.clone(), config).map(|c| c.percentage());
        info!(feature = %key, previous, percentage = new_pct, "rollout set");
        self.emit(AuditEvent::new(
            AuditKind::FeatureRolloutChanged,
            key,
            previous,
            new_pct,
        ));
    }

    /// Raise a feature's percentage. Accepted only when
    /// `current < new_percentage <= 100`; anything else is silently
    /// dropped, including calls for unknown keys. Returns the stored
    /// percentage after the call so callers can detect a dropped request,
    /// or `None` when the feature does not exist.
    #[must_use]
    pub fn increase_rollout(&self, feature_key: &str, new_percentage: f64) -> Option<f64> {
        let mut entry = self.configs.get_mut(feature_key)?;
        let current = entry.percentage();
        if new_percentage > current && new_percentage <= 100.0 {
            entry.set_percentage(new_percentage);
            drop(entry);
            info!(feature = %feature_key, from = current, to = new_percentage, "rollout increased");
            self.emit(AuditEvent::new(
                AuditKind::FeatureRolloutChanged,
                feature_key,
                Some(current),
                new_percentage,
            ));
            Some(new_percentage)
        } else {
            Some(current)
        }
    }

    /// Lower a feature's percentage. Accepted only when
    /// `0 <= new_percentage < current`; anything else is silently dropped.
    /// Returns the stored percentage after the call, or `None` when the
    /// feature does not exist.
    #[must_use]
    pub fn decrease_rollout(&self, feature_key: &str, new_percentage: f64) -> Option<f64> {
        let mut entry = self.configs.get_mut(feature_key)?;
        let current = entry.percentage();
        if new_percentage >= 0.0 && new_percentage < current {
            entry.set_percentage(new_percentage);
            drop(entry);
            info!(feature = %feature_key, from = current, to = new_percentage, "rollout decreased");
            self.emit(AuditEvent::new(
                AuditKind::FeatureRolloutChanged,
                feature_key,
                Some(current),
                new_percentage,
            ));
            Some(new_percentage)
        } else {
            Some(current)
        }
    }

    /// Force a feature to 0% unconditionally. No-op for unknown keys.
    pub fn kill_switch(&self, feature_key: &str) {
        let Some(mut entry) = self.configs.get_mut(feature_key) else {
            return;
        };
        let current = entry.percentage();
        entry.set_percentage(0.0);
        drop(entry);
        warn!(feature = %feature_key, from = current, "kill switch activated");
        self.emit(AuditEvent::new(
            AuditKind::FeatureKillSwitchActivated,
            feature_key,
            Some(current),
            0.0,
        ));
    }

    /// Force a feature to 100% unconditionally. No-op for unknown keys.
    pub fn full_rollout(&self, feature_key: &str) {
        let Some(mut entry) = self.configs.get_mut(feature_key) else {
            return;
        };
        let current = entry.percentage();
        entry.set_percentage(100.0);
        drop(entry);
        info!(feature = %feature_key, from = current, "full rollout");
        self.emit(AuditEvent::new(
            AuditKind::FeatureFullRollout,
            feature_key,
            Some(current),
            100.0,
        ));
    }

    /// Evaluate whether a subject is included in a feature's rollout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for unknown feature keys and
    /// [`Error::Validation`] for an empty subject id.
    pub fn evaluate(&self, feature_key: &str, subject_id: &str) -> Result<bool> {
        let config = self
            .configs
            .get(feature_key)
            .ok_or_else(|| Error::not_found(feature_key))?;
        evaluator::is_included(subject_id, &config)
    }

    /// Snapshot every config, for host-side persistence across restarts.
    #[must_use]
    pub fn snapshot(&self) -> Vec<RolloutConfig> {
        self.configs.iter().map(|entry| entry.clone()).collect()
    }

    /// Replace the whole map from a snapshot. Configs with out-of-range
    /// percentages are rejected before anything is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if any config carries a percentage
    /// outside `[0, 100]`.
    pub fn restore(&self, configs: Vec<RolloutConfig>) -> Result<()> {
        for config in &configs {
            validate_percentage(config.percentage())?;
        }
        self.configs.clear();
        for config in configs {
            self.configs
                .insert(config.feature_key().to_string(), config);
        }
        Ok(())
    }

    fn emit(&self, event: AuditEvent) {
        if let Err(e) = self.sink.publish(event) {
            warn!(error = %e, "audit event dropped");
        }
    }
}
