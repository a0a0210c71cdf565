//! Staged rollout strategies.
//!
//! Pure factories producing ordered [`RolloutConfig`] sequences. Nothing
//! here schedules anything: the caller applies each stage over time (cron,
//! operator action, deploy pipeline) via
//! [`RolloutManager::set_rollout`](super::RolloutManager::set_rollout).

use chrono::{Duration, Utc};

use crate::{Error, Result};

use super::RolloutConfig;

/// Percentage stages of the canary strategy.
pub const CANARY_STAGES: [f64; 6] = [1.0, 5.0, 10.0, 25.0, 50.0, 100.0];

/// Gradual ramp: `start, start + increment, ...` capped at 100, each stage
/// window-gated by an advancing `start_date` spaced `interval_days` apart
/// from now.
///
/// # Errors
///
/// Returns [`Error::Validation`] if `start` is outside `[0, 100]`,
/// `increment` is not positive, or `interval_days` is negative.
pub fn gradual(
    feature_key: &str,
    start: f64,
    increment: f64,
    interval_days: i64,
) -> Result<Vec<RolloutConfig>> {
    super::validate_percentage(start)?;
    if increment <= 0.0 {
        return Err(Error::validation(format!(
            "gradual increment must be positive, got {increment}"
        )));
    }
    if interval_days < 0 {
        return Err(Error::validation(format!(
            "gradual interval must be non-negative, got {interval_days} days"
        )));
    }

    let now = Utc::now();
    let mut stages = Vec::new();
    let mut pct = start;
    let mut stage = 0i64;
    loop {
        let capped = pct.min(100.0);
        stages.push(
            RolloutConfig::new(feature_key, capped)?
                .with_start_date(now + Duration::days(stage * interval_days)),
        );
        if capped >= 100.0 {
            break;
        }
        pct += increment;
        stage += 1;
    }
    Ok(stages)
}

/// Canary: fixed `1, 5, 10, 25, 50, 100` sequence.
///
/// # Errors
///
/// Returns [`Error::Validation`] if the feature key is empty.
pub fn canary(feature_key: &str) -> Result<Vec<RolloutConfig>> {
    CANARY_STAGES
        .iter()
        .map(|&pct| RolloutConfig::new(feature_key, pct))
        .collect()
}

/// Blue-green: instant cutover, `0` then `100`.
///
/// # Errors
///
/// Returns [`Error::Validation`] if the feature key is empty.
pub fn blue_green(feature_key: &str) -> Result<Vec<RolloutConfig>> {
    [0.0, 100.0]
        .iter()
        .map(|&pct| RolloutConfig::new(feature_key, pct))
        .collect()
}

/// Ring rollout: one config per named audience segment, each restricted to
/// that segment at its own percentage.
///
/// # Errors
///
/// Returns [`Error::Validation`] if any ring percentage leaves `[0, 100]`
/// or the feature key is empty.
pub fn ring(feature_key: &str, rings: &[(String, f64)]) -> Result<Vec<RolloutConfig>> {
    rings
        .iter()
        .map(|(segment, pct)| {
            Ok(RolloutConfig::new(feature_key, *pct)?
                .with_enabled_segments(vec![segment.clone()]))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradual_ramps_to_exactly_100() {
        let stages = gradual("f", 10.0, 25.0, 2).unwrap();
        let pcts: Vec<f64> = stages.iter().map(RolloutConfig::percentage).collect();
        assert_eq!(pcts, vec![10.0, 35.0, 60.0, 85.0, 100.0]);
        // Stage windows advance.
        for pair in stages.windows(2) {
            assert!(pair[0].start_date().unwrap() < pair[1].start_date().unwrap());
        }
    }

    #[test]
    fn gradual_rejects_non_positive_increment() {
        assert!(gradual("f", 10.0, 0.0, 1).is_err());
        assert!(gradual("f", 10.0, -5.0, 1).is_err());
    }

    #[test]
    fn gradual_rejects_start_outside_range() {
        assert!(gradual("f", -1.0, 10.0, 1).is_err());
        assert!(gradual("f", 100.5, 10.0, 1).is_err());
    }

    #[test]
    fn canary_sequence_is_fixed() {
        let stages = canary("f").unwrap();
        let pcts: Vec<f64> = stages.iter().map(RolloutConfig::percentage).collect();
        assert_eq!(pcts, vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0]);
    }

    #[test]
    fn blue_green_is_instant_cutover() {
        let stages = blue_green("f").unwrap();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].percentage(), 0.0);
        assert_eq!(stages[1].percentage(), 100.0);
    }

    #[test]
    fn ring_creates_one_config_per_segment() {
        let rings = vec![
            ("internal".to_string(), 100.0),
            ("beta".to_string(), 50.0),
            ("public".to_string(), 5.0),
        ];
        let stages = ring("f", &rings).unwrap();
        assert_eq!(stages.len(), 3);
        assert_eq!(stages[1].enabled_segments(), ["beta".to_string()]);
        assert_eq!(stages[1].percentage(), 50.0);
    }
}
