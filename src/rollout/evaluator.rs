//! Rollout inclusion evaluation.

use chrono::{DateTime, Utc};

use crate::assignment::bucket;
use crate::Result;

use super::RolloutConfig;

/// Decide whether a subject is included in a rollout, evaluated at the
/// current wall-clock time. See [`is_included_at`] for the precedence
/// rules.
///
/// # Errors
///
/// Returns [`crate::Error::Validation`] if `subject_id` is empty.
pub fn is_included(subject_id: &str, config: &RolloutConfig) -> Result<bool> {
    is_included_at(subject_id, config, Utc::now())
}

/// Decide whether a subject is included in a rollout at time `now`.
///
/// Precedence, highest first:
///
/// 1. Explicit overrides: `enabled` wins inclusion, `disabled` wins
///    exclusion, before anything else is consulted.
/// 2. Active window: outside `[start_date, end_date]` the subject is
///    excluded even at 100%.
/// 3. Deterministic bucket: included iff
///    `bucket(subject_id, feature_key) < percentage`.
///
/// # Errors
///
/// Returns [`crate::Error::Validation`] if `subject_id` is empty.
pub fn is_included_at(
    subject_id: &str,
    config: &RolloutConfig,
    now: DateTime<Utc>,
) -> Result<bool> {
    let overrides = config.user_overrides();
    if overrides.enabled.iter().any(|s| s == subject_id) {
        return Ok(true);
    }
    if overrides.disabled.iter().any(|s| s == subject_id) {
        return Ok(false);
    }

    if config.start_date().is_some_and(|start| now < start) {
        return Ok(false);
    }
    if config.end_date().is_some_and(|end| now > end) {
        return Ok(false);
    }

    let b = bucket(subject_id, config.feature_key())?;
    Ok(f64::from(b) < config.percentage())
}

/// Decide inclusion for a subject whose audience-segment memberships the
/// host has already resolved.
///
/// Segment rules slot between the override and bucket checks: membership
/// in any disabled segment excludes, membership in any enabled segment
/// includes, otherwise the percentage bucket decides as usual. Overrides
/// and the active window keep their precedence.
///
/// # Errors
///
/// Returns [`crate::Error::Validation`] if `subject_id` is empty.
pub fn is_included_for_segments(
    subject_id: &str,
    subject_segments: &[String],
    config: &RolloutConfig,
    now: DateTime<Utc>,
) -> Result<bool> {
    let overrides = config.user_overrides();
    if overrides.enabled.iter().any(|s| s == subject_id) {
        return Ok(true);
    }
    if overrides.disabled.iter().any(|s| s == subject_id) {
        return Ok(false);
    }

    if config.start_date().is_some_and(|start| now < start) {
        return Ok(false);
    }
    if config.end_date().is_some_and(|end| now > end) {
        return Ok(false);
    }

    if config
        .disabled_segments()
        .iter()
        .any(|seg| subject_segments.contains(seg))
    {
        return Ok(false);
    }
    if config
        .enabled_segments()
        .iter()
        .any(|seg| subject_segments.contains(seg))
    {
        return Ok(true);
    }

    let b = bucket(subject_id, config.feature_key())?;
    Ok(f64::from(b) < config.percentage())
}
