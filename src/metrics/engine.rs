//! On-demand aggregation and scoring over the event store.

use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use crate::definition::ExperimentDefinition;
use crate::Result;

use super::stats;
use super::{
    ConversionEvent, DateRange, EventStore, ExperimentMetrics, ExperimentSummary, ExposureEvent,
    Recommendation, VariantMetric,
};

/// Variant key treated as the baseline for significance testing.
pub const CONTROL_VARIANT: &str = "control";

/// Total exposures below which a summary recommends collecting more data.
const MIN_EXPOSURES_FOR_SUMMARY: u64 = 1000;

/// Experiment age beyond which a summary suggests wrapping up.
const MAX_EXPERIMENT_AGE_DAYS: i64 = 30;

/// Confidence tier at which a variant is considered deployable.
const DEPLOY_CONFIDENCE: u8 = 95;

/// Ingests exposure/conversion events and computes per-variant metrics
/// with pairwise confidence against the `control` variant.
#[derive(Debug)]
pub struct MetricsEngine<E> {
    events: E,
}

impl<E: EventStore> MetricsEngine<E> {
    /// Create an engine over the given event store.
    pub const fn new(events: E) -> Self {
        Self { events }
    }

    /// Append an exposure event. No validation against the experiment
    /// definition happens here; the write path stays cheap and available
    /// even if the definition is later edited or retired.
    ///
    /// # Errors
    ///
    /// Propagates event-store failures; callers on the decision path
    /// should treat them as best-effort.
    pub async fn track_exposure(
        &self,
        experiment_key: &str,
        variant_key: &str,
        subject_id: Option<&str>,
        metadata: Option<Value>,
    ) -> Result<()> {
        let mut event = ExposureEvent::new(experiment_key, variant_key);
        if let Some(subject) = subject_id {
            event = event.with_subject(subject);
        }
        if let Some(metadata) = metadata {
            event = event.with_metadata(metadata);
        }
        debug!(experiment = %experiment_key, variant = %variant_key, "exposure");
        self.events.append_exposure(event).await
    }

    /// Append a conversion event. Same write-path contract as
    /// [`Self::track_exposure`].
    ///
    /// # Errors
    ///
    /// Propagates event-store failures.
    pub async fn track_conversion(
        &self,
        experiment_key: &str,
        variant_key: &str,
        conversion_type: &str,
        subject_id: Option<&str>,
        value: Option<f64>,
        metadata: Option<Value>,
    ) -> Result<()> {
        let mut event = ConversionEvent::new(experiment_key, variant_key, conversion_type);
        if let Some(subject) = subject_id {
            event = event.with_subject(subject);
        }
        if let Some(value) = value {
            event = event.with_value(value);
        }
        if let Some(metadata) = metadata {
            event = event.with_metadata(metadata);
        }
        debug!(experiment = %experiment_key, variant = %variant_key, kind = %conversion_type, "conversion");
        self.events.append_conversion(event).await
    }

    /// Aggregate metrics for one experiment, all time or within an
    /// inclusive range.
    ///
    /// Variants appear in definition order first; variant keys seen only
    /// in events (definition edited after the fact) follow in sorted
    /// order, named by their key. When a `control` variant has enough
    /// exposures, every other sufficiently-exposed variant gets a
    /// confidence score against it.
    ///
    /// # Errors
    ///
    /// Propagates event-store failures.
    pub async fn metrics(
        &self,
        definition: &ExperimentDefinition,
        range: Option<DateRange>,
    ) -> Result<ExperimentMetrics> {
        let mut aggregates = self
            .events
            .aggregate(definition.key(), range.unwrap_or_else(DateRange::all))
            .await?;

        let mut variants = Vec::with_capacity(definition.variants().len());
        for variant in definition.variants() {
            let agg = aggregates.remove(variant.key()).unwrap_or_default();
            variants.push(metric_for(variant.key(), variant.name(), &agg));
        }
        // Leftovers: events for variants the definition no longer lists.
        let mut orphans: Vec<_> = aggregates.into_iter().collect();
        orphans.sort_by(|a, b| a.0.cmp(&b.0));
        for (key, agg) in orphans {
            let metric = metric_for(&key, &key, &agg);
            variants.push(metric);
        }

        let control = variants
            .iter()
            .find(|m| m.key == CONTROL_VARIANT)
            .map(|m| (m.conversions, m.exposures));
        if let Some((control_conversions, control_exposures)) = control {
            for metric in &mut variants {
                if metric.key == CONTROL_VARIANT {
                    continue;
                }
                metric.confidence = stats::confidence(
                    control_conversions,
                    control_exposures,
                    metric.conversions,
                    metric.exposures,
                );
            }
        }

        // Totals come from the per-variant aggregates, not a second event
        // scan, so they stay consistent with per-variant rounding.
        let total_exposures: u64 = variants.iter().map(|m| m.exposures).sum();
        let total_conversions: u64 = variants.iter().map(|m| m.conversions).sum();
        Ok(ExperimentMetrics {
            experiment_key: definition.key().to_string(),
            variants,
            total_exposures,
            total_conversions,
            overall_conversion_rate: rate(total_conversions, total_exposures),
        })
    }

    /// Metrics plus a recommendation.
    ///
    /// Precedence: fewer than 1000 total exposures asks for more data; a
    /// non-control variant beating control's conversion rate at >= 95
    /// confidence is deployable; an experiment older than 30 days (from
    /// the definition's creation) should consider ending; otherwise keep
    /// running.
    ///
    /// # Errors
    ///
    /// Propagates event-store failures.
    pub async fn summary(&self, definition: &ExperimentDefinition) -> Result<ExperimentSummary> {
        let metrics = self.metrics(definition, None).await?;
        let age_days = (Utc::now() - definition.created_at()).num_days();

        let recommendation = if metrics.total_exposures < MIN_EXPOSURES_FOR_SUMMARY {
            Recommendation::NeedMoreData
        } else if let Some(winner) = best_deployable(&metrics) {
            Recommendation::DeployVariant(winner)
        } else if age_days > MAX_EXPERIMENT_AGE_DAYS {
            Recommendation::ConsiderEnding
        } else {
            Recommendation::ContinueRunning
        };

        Ok(ExperimentSummary {
            metrics,
            age_days,
            recommendation,
        })
    }
}

fn metric_for(key: &str, name: &str, agg: &super::VariantAggregate) -> VariantMetric {
    VariantMetric {
        key: key.to_string(),
        name: name.to_string(),
        exposures: agg.exposures,
        conversions: agg.conversions,
        conversion_rate: rate(agg.conversions, agg.exposures),
        unique_exposures: agg.unique_exposures,
        unique_conversions: agg.unique_conversions,
        confidence: None,
    }
}

#[allow(clippy::cast_precision_loss)]
fn rate(conversions: u64, exposures: u64) -> f64 {
    if exposures == 0 {
        0.0
    } else {
        conversions as f64 / exposures as f64 * 100.0
    }
}

/// Highest-converting non-control variant that separated from control at
/// the deploy tier and actually beats control's rate (the z-test is
/// two-sided, so high confidence alone could also mean "confidently
/// worse").
fn best_deployable(metrics: &ExperimentMetrics) -> Option<String> {
    let control_rate = metrics
        .variants
        .iter()
        .find(|m| m.key == CONTROL_VARIANT)
        .map(|m| m.conversion_rate)?;
    metrics
        .variants
        .iter()
        .filter(|m| {
            m.key != CONTROL_VARIANT
                && m.confidence.is_some_and(|c| c >= DEPLOY_CONFIDENCE)
                && m.conversion_rate > control_rate
        })
        .max_by(|a, b| {
            a.conversion_rate
                .partial_cmp(&b.conversion_rate)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|m| m.key.clone())
}
