//! Two-proportion z-test and the confidence scale.
//!
//! Confidence is a coarse percentage label, not a rigorous p-value: the
//! 90/95/99 tiers map to the usual z thresholds, and anything below the
//! 90 tier falls back to `round(z * 35)` as an approximate scalar.
//! Consumers depend on this exact scale; do not refine the fallback.

/// Variants with this many exposures or fewer are not scored.
pub const MIN_EXPOSURES_FOR_SIGNIFICANCE: u64 = 30;

/// z threshold for the 99 tier.
pub const Z_99: f64 = 2.58;
/// z threshold for the 95 tier.
pub const Z_95: f64 = 1.96;
/// z threshold for the 90 tier.
pub const Z_90: f64 = 1.64;

/// Two-proportion z-score between control (`c1` conversions out of `n1`
/// exposures) and a variant (`c2` out of `n2`), using the pooled standard
/// error. Returns 0 when the standard error degenerates to 0 (both rates
/// identical at 0% or 100%).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn z_score(c1: u64, n1: u64, c2: u64, n2: u64) -> f64 {
    if n1 == 0 || n2 == 0 {
        return 0.0;
    }
    let (c1, n1, c2, n2) = (c1 as f64, n1 as f64, c2 as f64, n2 as f64);
    let p1 = c1 / n1;
    let p2 = c2 / n2;
    let pooled = (c1 + c2) / (n1 + n2);
    let se = (pooled * (1.0 - pooled) * (1.0 / n1 + 1.0 / n2)).sqrt();
    if se == 0.0 {
        return 0.0;
    }
    (p2 - p1).abs() / se
}

/// Map a z-score to the confidence scale.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn confidence_from_z(z: f64) -> u8 {
    if z >= Z_99 {
        99
    } else if z >= Z_95 {
        95
    } else if z >= Z_90 {
        90
    } else {
        // Coarse heuristic scalar; z < 1.64 keeps this below the 90 tier.
        (z * 35.0).round() as u8
    }
}

/// Score a variant against control, or `None` when either side lacks the
/// exposure volume for the test to mean anything.
#[must_use]
pub fn confidence(c1: u64, n1: u64, c2: u64, n2: u64) -> Option<u8> {
    if n1 <= MIN_EXPOSURES_FOR_SIGNIFICANCE || n2 <= MIN_EXPOSURES_FOR_SIGNIFICANCE {
        return None;
    }
    Some(confidence_from_z(z_score(c1, n1, c2, n2)))
}
