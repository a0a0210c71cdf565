//! Facade availability policy under collaborator failure: decision reads
//! fall open to the last-known definition, event tracking is best-effort,
//! administrative operations stay loud.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bandera::definition::{ExperimentDefinition, Variant};
use bandera::metrics::{ConversionEvent, DateRange, EventStore, ExposureEvent, VariantAggregate};
use bandera::registry::{DefinitionStore, ListFilter, MemoryDefinitionStore};
use bandera::{Engine, Error};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn offline() -> Error {
    Error::CollaboratorUnavailable("store offline".to_string())
}

fn two_arm(key: &str) -> ExperimentDefinition {
    ExperimentDefinition::builder(key, key)
        .variant(Variant::new("control", "Control", 50.0))
        .variant(Variant::new("bold", "Bold", 50.0))
        .default_variant("control")
        .active()
        .build()
        .unwrap()
}

// ============================================================================
// Failure-injecting stores
// ============================================================================

/// Definition store that can be taken offline mid-test via a shared flag.
#[derive(Debug)]
struct FlakyDefinitionStore {
    inner: MemoryDefinitionStore,
    down: Arc<AtomicBool>,
}

impl FlakyDefinitionStore {
    fn new() -> (Self, Arc<AtomicBool>) {
        let down = Arc::new(AtomicBool::new(false));
        let store = Self {
            inner: MemoryDefinitionStore::new(),
            down: Arc::clone(&down),
        };
        (store, down)
    }

    fn check(&self) -> Result<(), Error> {
        if self.down.load(Ordering::SeqCst) {
            return Err(offline());
        }
        Ok(())
    }
}

impl DefinitionStore for FlakyDefinitionStore {
    async fn get(&self, key: &str) -> bandera::Result<Option<ExperimentDefinition>> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn put(&self, definition: ExperimentDefinition) -> bandera::Result<()> {
        self.check()?;
        self.inner.put(definition).await
    }

    async fn list(&self, filter: ListFilter) -> bandera::Result<Vec<ExperimentDefinition>> {
        self.check()?;
        self.inner.list(filter).await
    }
}

/// Event store that is permanently unreachable.
#[derive(Debug)]
struct DownEventStore;

impl EventStore for DownEventStore {
    async fn append_exposure(&self, _event: ExposureEvent) -> bandera::Result<()> {
        Err(offline())
    }

    async fn append_conversion(&self, _event: ConversionEvent) -> bandera::Result<()> {
        Err(offline())
    }

    async fn aggregate(
        &self,
        _experiment_key: &str,
        _range: DateRange,
    ) -> bandera::Result<HashMap<String, VariantAggregate>> {
        Err(offline())
    }
}

// ============================================================================
// Decision reads fail open
// ============================================================================

#[tokio::test]
async fn decide_serves_cached_definition_when_store_is_down() {
    init_tracing();
    let (store, down) = FlakyDefinitionStore::new();
    let engine = Engine::builder().definition_store(store).build();
    engine.create_experiment(two_arm("exp")).await.unwrap();

    let healthy = engine.decide("exp", "user-1", None).await.unwrap();
    down.store(true, Ordering::SeqCst);

    // Same subject, same variant, no error: served from the cache.
    let degraded = engine.decide("exp", "user-1", None).await.unwrap();
    assert_eq!(degraded, healthy);
}

#[tokio::test]
async fn decide_with_store_down_and_no_cache_is_not_found() {
    init_tracing();
    let (store, down) = FlakyDefinitionStore::new();
    let engine = Engine::builder().definition_store(store).build();
    down.store(true, Ordering::SeqCst);

    // Never seen while the store was up; nothing to fall back to.
    let err = engine.decide("ghost", "user-1", None).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn admin_operations_stay_loud_when_store_is_down() {
    init_tracing();
    let (store, down) = FlakyDefinitionStore::new();
    let engine = Engine::builder().definition_store(store).build();
    engine.create_experiment(two_arm("exp")).await.unwrap();
    down.store(true, Ordering::SeqCst);

    let err = engine.create_experiment(two_arm("other")).await.unwrap_err();
    assert!(matches!(err, Error::CollaboratorUnavailable(_)));

    let err = engine
        .set_experiment_status("exp", false, "ops")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CollaboratorUnavailable(_)));
}

// ============================================================================
// Tracking is best-effort, analytical reads are not
// ============================================================================

#[tokio::test]
async fn tracking_swallows_event_store_failures() {
    init_tracing();
    let engine = Engine::builder().event_store(DownEventStore).build();
    engine.create_experiment(two_arm("exp")).await.unwrap();

    // Both complete; the drop is logged, never surfaced.
    engine.track_exposure("exp", "bold", Some("user-1"), None).await;
    engine
        .track_conversion("exp", "bold", "purchase", Some("user-1"), None, None)
        .await;

    // Aggregation is an analytical read and propagates the failure.
    let err = engine.metrics("exp", None).await.unwrap_err();
    assert!(matches!(err, Error::CollaboratorUnavailable(_)));
}
