//! Audit event sink boundary.
//!
//! Rollout mutations publish audit events through an [`EventSink`] handed
//! to the manager at construction. Publication is fire-and-forget: a sink
//! failure is logged by the caller and never fails the mutation itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Kind of rollout mutation being audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    /// Percentage changed through set/increase/decrease.
    FeatureRolloutChanged,
    /// Kill switch forced the percentage to 0.
    FeatureKillSwitchActivated,
    /// Full rollout forced the percentage to 100.
    FeatureFullRollout,
}

/// Audit record emitted on every accepted rollout mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// What happened.
    pub kind: AuditKind,
    /// Feature the mutation applied to.
    pub feature_key: String,
    /// Percentage before the mutation, if the config existed.
    pub previous_percentage: Option<f64>,
    /// Percentage after the mutation.
    pub new_percentage: f64,
    /// When the mutation was applied.
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    /// Create an audit event timestamped now.
    #[must_use]
    pub fn new(
        kind: AuditKind,
        feature_key: impl Into<String>,
        previous_percentage: Option<f64>,
        new_percentage: f64,
    ) -> Self {
        Self {
            kind,
            feature_key: feature_key.into(),
            previous_percentage,
            new_percentage,
            timestamp: Utc::now(),
        }
    }
}

/// Destination for rollout audit events.
///
/// Implementations own their delivery semantics (buffering, retries,
/// dropping); the rollout manager treats every publish as best-effort.
pub trait EventSink: Send + Sync {
    /// Publish one audit event.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::CollaboratorUnavailable`] (or any other
    /// error) when delivery fails; callers log and continue.
    fn publish(&self, event: AuditEvent) -> Result<()>;
}

/// Sink that discards every event. The default when no sink is wired.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn publish(&self, _event: AuditEvent) -> Result<()> {
        Ok(())
    }
}

/// In-memory sink capturing events for inspection in tests.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: std::sync::Mutex<Vec<AuditEvent>>,
}

impl MemoryEventSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all captured events, in publication order.
    ///
    /// # Panics
    ///
    /// Panics if the interior lock is poisoned.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().expect("sink lock poisoned").clone()
    }

    /// Number of captured events.
    ///
    /// # Panics
    ///
    /// Panics if the interior lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().expect("sink lock poisoned").len()
    }

    /// Whether no events have been captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for MemoryEventSink {
    fn publish(&self, event: AuditEvent) -> Result<()> {
        self.events.lock().expect("sink lock poisoned").push(event);
        Ok(())
    }
}
