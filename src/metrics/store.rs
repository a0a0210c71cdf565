//! Event store boundary and the in-memory reference backend.

use std::collections::HashMap;
use std::future::Future;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::Result;

use super::{ConversionEvent, ExposureEvent};

/// Inclusive timestamp range for aggregation queries. Unbounded sides are
/// `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Inclusive lower bound.
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound.
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    /// All time.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    /// Bounded on both sides, inclusive.
    #[must_use]
    pub const fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Whether `at` falls inside the range.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        if self.start.is_some_and(|start| at < start) {
            return false;
        }
        if self.end.is_some_and(|end| at > end) {
            return false;
        }
        true
    }
}

/// Raw per-variant counts produced by an aggregation query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantAggregate {
    /// Exposure events, duplicates included.
    pub exposures: u64,
    /// Conversion events, duplicates included.
    pub conversions: u64,
    /// Distinct exposed subjects (anonymous events excluded).
    pub unique_exposures: u64,
    /// Distinct converted subjects.
    pub unique_conversions: u64,
}

/// Append-only event store boundary.
///
/// Writes never validate against the experiment definition. Aggregation
/// groups by variant key within a timestamp range with distinct-subject
/// cardinality; backends with native grouping (document stores, SQL)
/// should push the query down rather than scanning. Methods return
/// futures so the host can bound aggregation scans with a deadline and
/// cancel by dropping.
pub trait EventStore: Send + Sync {
    /// Append one exposure event.
    ///
    /// # Errors
    ///
    /// [`crate::Error::CollaboratorUnavailable`] when the backing store is
    /// unreachable.
    fn append_exposure(&self, event: ExposureEvent) -> impl Future<Output = Result<()>> + Send;

    /// Append one conversion event.
    ///
    /// # Errors
    ///
    /// [`crate::Error::CollaboratorUnavailable`] when the backing store is
    /// unreachable.
    fn append_conversion(&self, event: ConversionEvent)
        -> impl Future<Output = Result<()>> + Send;

    /// Aggregate counts per variant key for one experiment within `range`.
    ///
    /// # Errors
    ///
    /// [`crate::Error::CollaboratorUnavailable`] when the backing store is
    /// unreachable.
    fn aggregate(
        &self,
        experiment_key: &str,
        range: DateRange,
    ) -> impl Future<Output = Result<HashMap<String, VariantAggregate>>> + Send;
}

/// In-memory event store: per-experiment event vectors behind a concurrent
/// map. The default backend; events are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    exposures: DashMap<String, Vec<ExposureEvent>>,
    conversions: DashMap<String, Vec<ConversionEvent>>,
}

impl MemoryEventStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total exposure events across all experiments.
    #[must_use]
    pub fn exposure_count(&self) -> usize {
        self.exposures.iter().map(|entry| entry.len()).sum()
    }

    /// Total conversion events across all experiments.
    #[must_use]
    pub fn conversion_count(&self) -> usize {
        self.conversions.iter().map(|entry| entry.len()).sum()
    }
}

impl EventStore for MemoryEventStore {
    async fn append_exposure(&self, event: ExposureEvent) -> Result<()> {
        self.exposures
            .entry(event.experiment_key().to_string())
            .or_default()
            .push(event);
        Ok(())
    }

    async fn append_conversion(&self, event: ConversionEvent) -> Result<()> {
        self.conversions
            .entry(event.experiment_key().to_string())
            .or_default()
            .push(event);
        Ok(())
    }

    async fn aggregate(
        &self,
        experiment_key: &str,
        range: DateRange,
    ) -> Result<HashMap<String, VariantAggregate>> {
        let mut totals: HashMap<String, VariantAggregate> = HashMap::new();
        let mut exposed: HashMap<String, FxHashSet<String>> = HashMap::new();
        let mut converted: HashMap<String, FxHashSet<String>> = HashMap::new();

        if let Some(events) = self.exposures.get(experiment_key) {
            for event in events.iter().filter(|e| range.contains(e.timestamp())) {
                let agg = totals.entry(event.variant_key().to_string()).or_default();
                agg.exposures += 1;
                if let Some(subject) = event.subject_id() {
                    exposed
                        .entry(event.variant_key().to_string())
                        .or_default()
                        .insert(subject.to_string());
                }
            }
        }

        if let Some(events) = self.conversions.get(experiment_key) {
            for event in events.iter().filter(|e| range.contains(e.timestamp())) {
                let agg = totals.entry(event.variant_key().to_string()).or_default();
                agg.conversions += 1;
                if let Some(subject) = event.subject_id() {
                    converted
                        .entry(event.variant_key().to_string())
                        .or_default()
                        .insert(subject.to_string());
                }
            }
        }

        for (variant, agg) in &mut totals {
            agg.unique_exposures = exposed.get(variant).map_or(0, |set| set.len() as u64);
            agg.unique_conversions = converted.get(variant).map_or(0, |set| set.len() as u64);
        }
        Ok(totals)
    }
}
