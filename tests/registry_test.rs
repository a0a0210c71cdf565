//! Experiment registry lifecycle through the public API.

use bandera::definition::{
    ExperimentDefinition, ExperimentPatch, RuleOperator, TargetingRule, Variant,
};
use bandera::registry::{ExperimentRegistry, ListFilter, MemoryDefinitionStore};
use bandera::Error;
use serde_json::json;

fn registry() -> ExperimentRegistry<MemoryDefinitionStore> {
    ExperimentRegistry::new(MemoryDefinitionStore::new())
}

fn checkout_cta() -> ExperimentDefinition {
    ExperimentDefinition::builder("checkout_cta", "Checkout CTA")
        .description("Bold CTA copy test")
        .variant(Variant::new("control", "Control", 50.0))
        .variant(Variant::new("bold", "Bold", 50.0).with_payload(json!({"label": "Buy now!"})))
        .default_variant("control")
        .active()
        .created_by("alice")
        .build()
        .unwrap()
}

// =============================================================================
// Creation invariants (Scenario D included)
// =============================================================================

#[test]
fn weights_not_summing_to_100_fail_before_any_write() {
    // Scenario D: [60, 60] must be a validation error.
    let err = ExperimentDefinition::builder("bad", "Bad")
        .variant(Variant::new("a", "A", 60.0))
        .variant(Variant::new("b", "B", 60.0))
        .default_variant("a")
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn create_rejects_duplicates_and_leaves_original() {
    let registry = registry();
    registry.create(checkout_cta()).await.unwrap();

    let err = registry.create(checkout_cta()).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let stored = registry.get("checkout_cta").await.unwrap();
    assert_eq!(stored.created_by(), "alice");
}

// =============================================================================
// Updates
// =============================================================================

#[tokio::test]
async fn update_merges_and_revalidates() {
    let registry = registry();
    registry.create(checkout_cta()).await.unwrap();

    // Valid reweighting commits.
    let updated = registry
        .update(
            "checkout_cta",
            ExperimentPatch {
                variants: Some(vec![
                    Variant::new("control", "Control", 20.0),
                    Variant::new("bold", "Bold", 80.0),
                ]),
                ..ExperimentPatch::default()
            },
            "bob",
        )
        .await
        .unwrap();
    assert_eq!(updated.variants()[1].weight(), 80.0);
    assert_eq!(updated.updated_by(), "bob");

    // Invalid patch (default variant orphaned) is rejected atomically.
    let err = registry
        .update(
            "checkout_cta",
            ExperimentPatch {
                default_variant: Some("missing".to_string()),
                ..ExperimentPatch::default()
            },
            "bob",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    let stored = registry.get("checkout_cta").await.unwrap();
    assert_eq!(stored.default_variant(), "control");
}

#[tokio::test]
async fn update_can_add_targeting_rules() {
    let registry = registry();
    registry.create(checkout_cta()).await.unwrap();

    let updated = registry
        .update(
            "checkout_cta",
            ExperimentPatch {
                targeting_rules: Some(vec![TargetingRule::new(
                    "country",
                    RuleOperator::In,
                    json!(["US", "CA"]),
                )]),
                ..ExperimentPatch::default()
            },
            "bob",
        )
        .await
        .unwrap();
    assert_eq!(updated.targeting_rules().len(), 1);
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn set_status_and_list_filtering() {
    let registry = registry();
    registry.create(checkout_cta()).await.unwrap();
    registry
        .set_status("checkout_cta", false, "ops")
        .await
        .unwrap();

    assert!(registry
        .list(ListFilter::active())
        .await
        .unwrap()
        .is_empty());
    assert_eq!(registry.list(ListFilter::all()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn soft_delete_preserves_history_and_blocks_reuse() {
    let registry = registry();
    registry.create(checkout_cta()).await.unwrap();
    registry.soft_delete("checkout_cta", "ops").await.unwrap();

    // Gone from live reads and default listings...
    assert!(matches!(
        registry.get("checkout_cta").await,
        Err(Error::NotFound(_))
    ));
    assert!(registry.list(ListFilter::all()).await.unwrap().is_empty());

    // ...but the row survives for attribution...
    let retired = registry.get_any("checkout_cta").await.unwrap();
    assert_eq!(retired.deleted_by(), Some("ops"));
    let listed = registry
        .list(ListFilter {
            include_deleted: true,
            ..ListFilter::all()
        })
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);

    // ...and the key is never reused.
    assert!(registry.create(checkout_cta()).await.is_err());

    // Further mutations on a deleted definition are NotFound.
    assert!(matches!(
        registry.soft_delete("checkout_cta", "ops").await,
        Err(Error::NotFound(_))
    ));
}
