//! Metrics & significance: exposure/conversion ingestion and scoring.
//!
//! Raw events are append-only and never validated against the experiment
//! definition at write time, so the write path stays cheap and available
//! even while a definition is being edited or retired. Aggregation and
//! the two-proportion z-test run on demand over the [`EventStore`]
//! boundary.
//!
//! Events carry no unique identifier: duplicate delivery inflates counts
//! rather than erroring. Known limitation, accepted by design.

mod engine;
mod event;
pub mod stats;
mod store;

pub use engine::MetricsEngine;
pub use event::{ConversionEvent, ExposureEvent};
pub use store::{DateRange, EventStore, MemoryEventStore, VariantAggregate};

use serde::{Deserialize, Serialize};

/// Per-variant aggregate computed on demand; never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantMetric {
    /// Variant key.
    pub key: String,
    /// Variant display name from the definition, or the key itself when
    /// the definition no longer lists this variant.
    pub name: String,
    /// Exposure count, duplicates included.
    pub exposures: u64,
    /// Conversion count, duplicates included.
    pub conversions: u64,
    /// `conversions / exposures * 100`; 0 when there are no exposures.
    pub conversion_rate: f64,
    /// Distinct subjects exposed (events without a subject id excluded).
    pub unique_exposures: u64,
    /// Distinct subjects converted.
    pub unique_conversions: u64,
    /// Confidence versus the control variant, when computable. `99`, `95`,
    /// and `90` are z-test tiers; lower values are the coarse `z*35`
    /// heuristic.
    pub confidence: Option<u8>,
}

/// Full metrics for one experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentMetrics {
    /// Experiment key.
    pub experiment_key: String,
    /// Per-variant aggregates, definition order first, then any variant
    /// keys seen only in events.
    pub variants: Vec<VariantMetric>,
    /// Exposures summed across the per-variant aggregates.
    pub total_exposures: u64,
    /// Conversions summed across the per-variant aggregates.
    pub total_conversions: u64,
    /// `total_conversions / total_exposures * 100`, consistent with the
    /// per-variant rounding because it is derived from the same sums.
    pub overall_conversion_rate: f64,
}

/// Recommendation derived from an experiment's metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action", content = "variant")]
pub enum Recommendation {
    /// Fewer than 1000 total exposures.
    NeedMoreData,
    /// The named variant separated from control at >= 95 confidence.
    DeployVariant(String),
    /// The experiment has run longer than 30 days without a winner.
    ConsiderEnding,
    /// Keep collecting.
    ContinueRunning,
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NeedMoreData => write!(f, "need more data"),
            Self::DeployVariant(key) => write!(f, "deploy variant {key}"),
            Self::ConsiderEnding => write!(f, "consider ending"),
            Self::ContinueRunning => write!(f, "continue running"),
        }
    }
}

/// Metrics plus a recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSummary {
    /// The underlying metrics.
    pub metrics: ExperimentMetrics,
    /// Age of the experiment in whole days, measured from the definition's
    /// creation timestamp.
    pub age_days: i64,
    /// What to do next.
    pub recommendation: Recommendation,
}
