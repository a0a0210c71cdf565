//! Variant resolution over an experiment definition.
//!
//! Pure and side-effect free: the same `(definition, subject)` pair always
//! resolves to the same variant as long as the variant list and weights are
//! unchanged. Editing weights may reassign subjects near bucket boundaries;
//! that drift is accepted and documented rather than compensated for.

use crate::assignment::bucket;
use crate::definition::{Attributes, ExperimentDefinition, Variant};
use crate::Result;

/// Resolve the variant a subject falls into.
///
/// Targeting rules gate first: if any rule fails, the subject gets the
/// default variant without consuming a bucket. Eligible subjects are
/// bucketed with the experiment's salt and walked through the variants in
/// declaration order, each owning a cumulative slice of `[0, 100)`
/// proportional to its weight. Unweighted variant sets (all weights zero)
/// split the range into equal widths, remainder going to the earliest
/// variants.
///
/// # Errors
///
/// Returns [`crate::Error::Validation`] if `subject_id` is empty.
pub fn resolve_variant<'a>(
    definition: &'a ExperimentDefinition,
    subject_id: &str,
    attributes: &Attributes,
) -> Result<&'a str> {
    if !definition
        .targeting_rules()
        .iter()
        .all(|rule| rule.matches(attributes))
    {
        return Ok(definition.default_variant());
    }

    let b = bucket(subject_id, definition.salt())?;
    Ok(pick_by_bucket(definition.variants(), b).unwrap_or_else(|| definition.default_variant()))
}

/// Walk variants in declaration order and return the one whose cumulative
/// weight range contains `bucket`.
fn pick_by_bucket(variants: &[Variant], bucket: u8) -> Option<&str> {
    let weighted = variants.iter().any(|v| v.weight() > 0.0);
    let b = f64::from(bucket);
    let mut cumulative = 0.0;
    for (i, variant) in variants.iter().enumerate() {
        cumulative += if weighted {
            variant.weight()
        } else {
            equal_width(variants.len(), i)
        };
        if b < cumulative {
            return Some(variant.key());
        }
    }
    // Bucket 99 can escape the walk when weights sum below 100 through
    // floating point loss; the last variant owns the tail.
    variants.last().map(Variant::key)
}

/// Width of slot `index` when `[0, 100)` is split evenly across `count`
/// variants: `100 / count` rounded down, with the remainder distributed one
/// bucket each to the earliest variants.
#[allow(clippy::cast_precision_loss)]
fn equal_width(count: usize, index: usize) -> f64 {
    let base = 100 / count;
    let remainder = 100 % count;
    (base + usize::from(index < remainder)) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{RuleOperator, TargetingRule};
    use serde_json::json;

    fn definition(variants: Vec<Variant>) -> ExperimentDefinition {
        ExperimentDefinition::builder("exp", "Exp")
            .variants(variants)
            .default_variant("control")
            .build()
            .unwrap()
    }

    #[test]
    fn resolution_is_deterministic() {
        let def = definition(vec![
            Variant::new("control", "Control", 50.0),
            Variant::new("bold", "Bold", 50.0),
        ]);
        let attrs = Attributes::new();
        let first = resolve_variant(&def, "user-1", &attrs).unwrap();
        for _ in 0..10 {
            assert_eq!(resolve_variant(&def, "user-1", &attrs).unwrap(), first);
        }
    }

    #[test]
    fn failed_targeting_returns_default() {
        let def = ExperimentDefinition::builder("exp", "Exp")
            .variant(Variant::new("control", "Control", 10.0))
            .variant(Variant::new("treatment", "Treatment", 90.0))
            .default_variant("control")
            .targeting_rule(TargetingRule::new(
                "plan",
                RuleOperator::Equals,
                json!("pro"),
            ))
            .build()
            .unwrap();

        // No attributes: every subject gets the default, even ones whose
        // bucket would land in the 90% treatment range.
        let attrs = Attributes::new();
        for i in 0..50 {
            let v = resolve_variant(&def, &format!("user-{i}"), &attrs).unwrap();
            assert_eq!(v, "control");
        }

        let mut pro = Attributes::new();
        pro.insert("plan".to_string(), json!("pro"));
        let assigned: Vec<_> = (0..50)
            .map(|i| resolve_variant(&def, &format!("user-{i}"), &pro).unwrap())
            .collect();
        assert!(assigned.iter().any(|v| *v == "treatment"));
    }

    #[test]
    fn full_weight_variant_takes_all_buckets() {
        let def = definition(vec![
            Variant::new("control", "Control", 0.0),
            Variant::new("all", "All", 100.0),
        ]);
        let attrs = Attributes::new();
        for i in 0..100 {
            let v = resolve_variant(&def, &format!("user-{i}"), &attrs).unwrap();
            assert_eq!(v, "all");
        }
    }

    #[test]
    fn equal_widths_cover_all_buckets() {
        // 3 variants: widths 34, 33, 33.
        assert!((equal_width(3, 0) - 34.0).abs() < f64::EPSILON);
        assert!((equal_width(3, 1) - 33.0).abs() < f64::EPSILON);
        assert!((equal_width(3, 2) - 33.0).abs() < f64::EPSILON);
        let total: f64 = (0..3).map(|i| equal_width(3, i)).sum();
        assert!((total - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unweighted_three_way_split_uses_every_variant() {
        let def = ExperimentDefinition::builder("exp", "Exp")
            .variant(Variant::unweighted("control", "Control"))
            .variant(Variant::unweighted("b", "B"))
            .variant(Variant::unweighted("c", "C"))
            .default_variant("control")
            .build()
            .unwrap();
        let attrs = Attributes::new();
        let mut seen = std::collections::HashSet::new();
        for i in 0..300 {
            seen.insert(resolve_variant(&def, &format!("user-{i}"), &attrs).unwrap());
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn pick_by_bucket_boundary_ownership() {
        let variants = vec![
            Variant::new("a", "A", 30.0),
            Variant::new("b", "B", 70.0),
        ];
        assert_eq!(pick_by_bucket(&variants, 0), Some("a"));
        assert_eq!(pick_by_bucket(&variants, 29), Some("a"));
        assert_eq!(pick_by_bucket(&variants, 30), Some("b"));
        assert_eq!(pick_by_bucket(&variants, 99), Some("b"));
    }
}
