//! Progressive rollout: per-feature partial exposure.
//!
//! A [`RolloutConfig`] describes what fraction of subjects see a feature,
//! bounded by an optional active window, carved up by named audience
//! segments, and short-circuited by explicit per-subject overrides. The
//! [`RolloutManager`] holds one config per feature key as process-scoped
//! state and guards every mutation; [`strategy`] builds staged config
//! sequences for a caller-owned scheduler.

mod evaluator;
mod manager;
pub mod strategy;

pub use evaluator::{is_included, is_included_at, is_included_for_segments};
pub use manager::RolloutManager;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Explicit per-subject inclusion/exclusion lists, checked before anything
/// else during evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserOverrides {
    /// Subjects always included, even at 0%.
    #[serde(default)]
    pub enabled: Vec<String>,
    /// Subjects always excluded, even at 100%.
    #[serde(default)]
    pub disabled: Vec<String>,
}

impl UserOverrides {
    /// Whether both lists are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty() && self.disabled.is_empty()
    }
}

/// Partial-exposure configuration for a single feature.
///
/// `percentage` is the single probabilistic source of truth; overrides and
/// the active window take precedence over it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolloutConfig {
    feature_key: String,
    percentage: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    enabled_segments: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    disabled_segments: Vec<String>,
    #[serde(default, skip_serializing_if = "UserOverrides::is_empty")]
    user_overrides: UserOverrides,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    end_date: Option<DateTime<Utc>>,
}

impl RolloutConfig {
    /// Create a config exposing `percentage` percent of subjects.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the feature key is empty or the
    /// percentage leaves `[0, 100]`.
    pub fn new(feature_key: impl Into<String>, percentage: f64) -> Result<Self> {
        let feature_key = feature_key.into();
        if feature_key.is_empty() {
            return Err(Error::validation("feature key must be non-empty"));
        }
        validate_percentage(percentage)?;
        Ok(Self {
            feature_key,
            percentage,
            enabled_segments: Vec::new(),
            disabled_segments: Vec::new(),
            user_overrides: UserOverrides::default(),
            start_date: None,
            end_date: None,
        })
    }

    /// Restrict the rollout to named audience segments.
    #[must_use]
    pub fn with_enabled_segments(mut self, segments: Vec<String>) -> Self {
        self.enabled_segments = segments;
        self
    }

    /// Exclude named audience segments.
    #[must_use]
    pub fn with_disabled_segments(mut self, segments: Vec<String>) -> Self {
        self.disabled_segments = segments;
        self
    }

    /// Attach explicit subject overrides.
    #[must_use]
    pub fn with_overrides(mut self, overrides: UserOverrides) -> Self {
        self.user_overrides = overrides;
        self
    }

    /// Bound the active window from below.
    #[must_use]
    pub const fn with_start_date(mut self, at: DateTime<Utc>) -> Self {
        self.start_date = Some(at);
        self
    }

    /// Bound the active window from above.
    #[must_use]
    pub const fn with_end_date(mut self, at: DateTime<Utc>) -> Self {
        self.end_date = Some(at);
        self
    }

    /// Feature identifier; doubles as the bucketing salt.
    #[must_use]
    pub fn feature_key(&self) -> &str {
        &self.feature_key
    }

    /// Fraction of subjects included, in `[0, 100]`.
    #[must_use]
    pub const fn percentage(&self) -> f64 {
        self.percentage
    }

    /// Segments the rollout is restricted to, if any.
    #[must_use]
    pub fn enabled_segments(&self) -> &[String] {
        &self.enabled_segments
    }

    /// Segments excluded from the rollout.
    #[must_use]
    pub fn disabled_segments(&self) -> &[String] {
        &self.disabled_segments
    }

    /// Explicit subject overrides.
    #[must_use]
    pub const fn user_overrides(&self) -> &UserOverrides {
        &self.user_overrides
    }

    /// Start of the active window, if bounded.
    #[must_use]
    pub const fn start_date(&self) -> Option<DateTime<Utc>> {
        self.start_date
    }

    /// End of the active window, if bounded.
    #[must_use]
    pub const fn end_date(&self) -> Option<DateTime<Utc>> {
        self.end_date
    }

    pub(crate) fn set_percentage(&mut self, percentage: f64) {
        self.percentage = percentage;
    }
}

pub(crate) fn validate_percentage(percentage: f64) -> Result<()> {
    if !(0.0..=100.0).contains(&percentage) {
        return Err(Error::validation(format!(
            "percentage {percentage} outside [0, 100]"
        )));
    }
    Ok(())
}
