//! Experiment definition - root entity of the experimentation schema

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

use super::{TargetingRule, TrafficAllocation, Variant};

/// Tolerance when checking that explicit weights sum to 100.
const WEIGHT_SUM_EPSILON: f64 = 1e-9;

/// A configured A/B or multivariate test.
///
/// The `key` is globally unique, immutable once created, and never reused
/// after soft deletion so that historical exposure/conversion events stay
/// attributable. All mutation goes through
/// [`crate::registry::ExperimentRegistry`], which re-validates invariants
/// and stamps attribution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentDefinition {
    key: String,
    name: String,
    #[serde(default)]
    description: String,
    variants: Vec<Variant>,
    default_variant: String,
    is_active: bool,
    #[serde(default)]
    traffic_allocation: TrafficAllocation,
    #[serde(default)]
    targeting_rules: Vec<TargetingRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    end_date: Option<DateTime<Utc>>,
    created_by: String,
    created_at: DateTime<Utc>,
    updated_by: String,
    updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deleted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deleted_by: Option<String>,
}

impl ExperimentDefinition {
    /// Create a builder for a new definition.
    #[must_use]
    pub fn builder(key: impl Into<String>, name: impl Into<String>) -> ExperimentDefinitionBuilder {
        ExperimentDefinitionBuilder::new(key, name)
    }

    /// Unique experiment key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Human-readable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Free-text description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Ordered variant list.
    #[must_use]
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    /// Key of the fallback variant returned to ineligible subjects.
    #[must_use]
    pub fn default_variant(&self) -> &str {
        &self.default_variant
    }

    /// Whether the experiment is live.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.is_active
    }

    /// Traffic allocation settings.
    #[must_use]
    pub const fn traffic_allocation(&self) -> &TrafficAllocation {
        &self.traffic_allocation
    }

    /// Eligibility rules, all of which must pass (AND semantics).
    #[must_use]
    pub fn targeting_rules(&self) -> &[TargetingRule] {
        &self.targeting_rules
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

    /// Who created the definition.
    #[must_use]
    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    /// Creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Who performed the last mutation.
    #[must_use]
    pub fn updated_by(&self) -> &str {
        &self.updated_by
    }

    /// Timestamp of the last mutation.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Soft-deletion timestamp, if retired.
    #[must_use]
    pub const fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    /// Who retired the definition, if retired.
    #[must_use]
    pub fn deleted_by(&self) -> Option<&str> {
        self.deleted_by.as_deref()
    }

    /// Whether the definition has been soft-deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Whether `now` falls inside the `[start_date, end_date]` window.
    #[must_use]
    pub fn is_within_window(&self, now: DateTime<Utc>) -> bool {
        if self.start_date.is_some_and(|start| now < start) {
            return false;
        }
        if self.end_date.is_some_and(|end| now > end) {
            return false;
        }
        true
    }

    /// Bucketing salt for this experiment: the explicit allocation seed if
    /// one is set, otherwise the experiment key.
    #[must_use]
    pub fn salt(&self) -> &str {
        self.traffic_allocation.seed().unwrap_or(&self.key)
    }

    /// Check the definition invariants.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the variant list is empty, variant
    /// keys collide, any weight leaves `[0, 100]`, explicit weights do not
    /// sum to exactly 100, or `default_variant` names no variant.
    pub fn validate(&self) -> Result<()> {
        if self.key.is_empty() {
            return Err(Error::validation("experiment key must be non-empty"));
        }
        if self.variants.is_empty() {
            return Err(Error::validation(format!(
                "experiment '{}' has no variants",
                self.key
            )));
        }

        let mut seen = std::collections::HashSet::new();
        for variant in &self.variants {
            if !seen.insert(variant.key()) {
                return Err(Error::validation(format!(
                    "duplicate variant key '{}' in experiment '{}'",
                    variant.key(),
                    self.key
                )));
            }
            if !(0.0..=100.0).contains(&variant.weight()) {
                return Err(Error::validation(format!(
                    "variant '{}' weight {} outside [0, 100]",
                    variant.key(),
                    variant.weight()
                )));
            }
        }

        let total: f64 = self.variants.iter().map(Variant::weight).sum();
        let any_weighted = self.variants.iter().any(|v| v.weight() > 0.0);
        if any_weighted && (total - 100.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(Error::validation(format!(
                "variant weights sum to {total}, expected 100"
            )));
        }

        if !self
            .variants
            .iter()
            .any(|v| v.key() == self.default_variant)
        {
            return Err(Error::validation(format!(
                "default variant '{}' is not among the variants of '{}'",
                self.default_variant, self.key
            )));
        }

        Ok(())
    }

    pub(crate) fn stamp_update(&mut self, actor: &str, at: DateTime<Utc>) {
        self.updated_by = actor.to_string();
        self.updated_at = at;
    }

    pub(crate) fn mark_deleted(&mut self, actor: &str, at: DateTime<Utc>) {
        self.is_active = false;
        self.deleted_at = Some(at);
        self.deleted_by = Some(actor.to_string());
        self.stamp_update(actor, at);
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }

    pub(crate) fn apply(&mut self, patch: ExperimentPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(variants) = patch.variants {
            self.variants = variants;
        }
        if let Some(default_variant) = patch.default_variant {
            self.default_variant = default_variant;
        }
        if let Some(is_active) = patch.is_active {
            self.is_active = is_active;
        }
        if let Some(traffic_allocation) = patch.traffic_allocation {
            self.traffic_allocation = traffic_allocation;
        }
        if let Some(targeting_rules) = patch.targeting_rules {
            self.targeting_rules = targeting_rules;
        }
        if let Some(start_date) = patch.start_date {
            self.start_date = start_date;
        }
        if let Some(end_date) = patch.end_date {
            self.end_date = end_date;
        }
    }
}

/// Partial update applied to an existing definition.
///
/// `None` leaves the field untouched; the window fields use a nested
/// `Option` so a patch can also clear a bound. The registry validates the
/// merged result before committing, so a patch can never leave a
/// definition violating its invariants.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperimentPatch {
    /// New name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// Replacement variant list.
    pub variants: Option<Vec<Variant>>,
    /// New default variant key.
    pub default_variant: Option<String>,
    /// New active state.
    pub is_active: Option<bool>,
    /// New traffic allocation.
    pub traffic_allocation: Option<TrafficAllocation>,
    /// Replacement targeting rules.
    pub targeting_rules: Option<Vec<TargetingRule>>,
    /// New start bound (`Some(None)` clears it).
    pub start_date: Option<Option<DateTime<Utc>>>,
    /// New end bound (`Some(None)` clears it).
    pub end_date: Option<Option<DateTime<Utc>>>,
}

/// Builder for [`ExperimentDefinition`].
#[derive(Debug)]
pub struct ExperimentDefinitionBuilder {
    key: String,
    name: String,
    description: String,
    variants: Vec<Variant>,
    default_variant: Option<String>,
    is_active: bool,
    traffic_allocation: TrafficAllocation,
    targeting_rules: Vec<TargetingRule>,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    created_by: String,
}

impl ExperimentDefinitionBuilder {
    /// Create a builder with the required fields. The definition starts
    /// inactive (draft) unless [`Self::active`] is called.
    #[must_use]
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            description: String::new(),
            variants: Vec::new(),
            default_variant: None,
            is_active: false,
            traffic_allocation: TrafficAllocation::default(),
            targeting_rules: Vec::new(),
            start_date: None,
            end_date: None,
            created_by: "system".to_string(),
        }
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Append a variant, preserving declaration order.
    #[must_use]
    pub fn variant(mut self, variant: Variant) -> Self {
        self.variants.push(variant);
        self
    }

    /// Replace the whole variant list.
    #[must_use]
    pub fn variants(mut self, variants: Vec<Variant>) -> Self {
        self.variants = variants;
        self
    }

    /// Set the default variant key.
    #[must_use]
    pub fn default_variant(mut self, key: impl Into<String>) -> Self {
        self.default_variant = Some(key.into());
        self
    }

    /// Create the experiment in the active state.
    #[must_use]
    pub const fn active(mut self) -> Self {
        self.is_active = true;
        self
    }

    /// Set traffic allocation.
    #[must_use]
    pub fn traffic_allocation(mut self, allocation: TrafficAllocation) -> Self {
        self.traffic_allocation = allocation;
        self
    }

    /// Append a targeting rule.
    #[must_use]
    pub fn targeting_rule(mut self, rule: TargetingRule) -> Self {
        self.targeting_rules.push(rule);
        self
    }

    /// Bound the active window from below.
    #[must_use]
    pub const fn start_date(mut self, at: DateTime<Utc>) -> Self {
        self.start_date = Some(at);
        self
    }

    /// Bound the active window from above.
    #[must_use]
    pub const fn end_date(mut self, at: DateTime<Utc>) -> Self {
        self.end_date = Some(at);
        self
    }

    /// Attribute the creation; defaults to `"system"`.
    #[must_use]
    pub fn created_by(mut self, actor: impl Into<String>) -> Self {
        self.created_by = actor.into();
        self
    }

    /// Build and validate the definition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if any invariant from
    /// [`ExperimentDefinition::validate`] fails, including a missing
    /// `default_variant`.
    pub fn build(self) -> Result<ExperimentDefinition> {
        let default_variant = self
            .default_variant
            .ok_or_else(|| Error::validation("default_variant is required"))?;
        let now = Utc::now();
        let definition = ExperimentDefinition {
            key: self.key,
            name: self.name,
            description: self.description,
            variants: self.variants,
            default_variant,
            is_active: self.is_active,
            traffic_allocation: self.traffic_allocation,
            targeting_rules: self.targeting_rules,
            start_date: self.start_date,
            end_date: self.end_date,
            created_by: self.created_by.clone(),
            created_at: now,
            updated_by: self.created_by,
            updated_at: now,
            deleted_at: None,
            deleted_by: None,
        };
        definition.validate()?;
        Ok(definition)
    }
}
