//! Exposure and conversion event records.
//!
//! Append-only and immutable once created. There is no natural key beyond
//! the field tuple plus timestamp; duplicate delivery is tolerated and
//! simply inflates counts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Record that a subject observed a given variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureEvent {
    experiment_key: String,
    variant_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subject_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<Value>,
    timestamp: DateTime<Utc>,
}

impl ExposureEvent {
    /// Create an exposure event timestamped now.
    #[must_use]
    pub fn new(experiment_key: impl Into<String>, variant_key: impl Into<String>) -> Self {
        Self {
            experiment_key: experiment_key.into(),
            variant_key: variant_key.into(),
            subject_id: None,
            metadata: None,
            timestamp: Utc::now(),
        }
    }

    /// Attribute the exposure to a subject; anonymous events are counted
    /// but excluded from unique-subject cardinality.
    #[must_use]
    pub fn with_subject(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }

    /// Attach opaque metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Override the timestamp (backfills, tests).
    #[must_use]
    pub const fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Experiment the exposure belongs to.
    #[must_use]
    pub fn experiment_key(&self) -> &str {
        &self.experiment_key
    }

    /// Variant the subject observed.
    #[must_use]
    pub fn variant_key(&self) -> &str {
        &self.variant_key
    }

    /// Subject, if the caller attributed one.
    #[must_use]
    pub fn subject_id(&self) -> Option<&str> {
        self.subject_id.as_deref()
    }

    /// Opaque caller metadata.
    #[must_use]
    pub const fn metadata(&self) -> Option<&Value> {
        self.metadata.as_ref()
    }

    /// When the exposure happened.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Record that a subject completed a tracked outcome attributable to an
/// experiment variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionEvent {
    experiment_key: String,
    variant_key: String,
    conversion_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subject_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<Value>,
    timestamp: DateTime<Utc>,
}

impl ConversionEvent {
    /// Create a conversion event timestamped now.
    #[must_use]
    pub fn new(
        experiment_key: impl Into<String>,
        variant_key: impl Into<String>,
        conversion_type: impl Into<String>,
    ) -> Self {
        Self {
            experiment_key: experiment_key.into(),
            variant_key: variant_key.into(),
            conversion_type: conversion_type.into(),
            subject_id: None,
            value: None,
            metadata: None,
            timestamp: Utc::now(),
        }
    }

    /// Attribute the conversion to a subject.
    #[must_use]
    pub fn with_subject(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }

    /// Attach a monetary or scalar outcome value.
    #[must_use]
    pub const fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    /// Attach opaque metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Override the timestamp (backfills, tests).
    #[must_use]
    pub const fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Experiment the conversion belongs to.
    #[must_use]
    pub fn experiment_key(&self) -> &str {
        &self.experiment_key
    }

    /// Variant credited with the conversion.
    #[must_use]
    pub fn variant_key(&self) -> &str {
        &self.variant_key
    }

    /// Caller-defined outcome kind ("purchase", "signup", ...).
    #[must_use]
    pub fn conversion_type(&self) -> &str {
        &self.conversion_type
    }

    /// Subject, if the caller attributed one.
    #[must_use]
    pub fn subject_id(&self) -> Option<&str> {
        self.subject_id.as_deref()
    }

    /// Scalar outcome value, if any.
    #[must_use]
    pub const fn value(&self) -> Option<f64> {
        self.value
    }

    /// Opaque caller metadata.
    #[must_use]
    pub const fn metadata(&self) -> Option<&Value> {
        self.metadata.as_ref()
    }

    /// When the conversion happened.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
