//! Experiment definition schema
//!
//! The data model for configured A/B and multivariate tests:
//!
//! ```text
//! ExperimentDefinition
//!     ├── Variant (ordered, weighted, opaque payload)
//!     ├── TrafficAllocation
//!     └── TargetingRule (AND semantics)
//! ```
//!
//! Definitions are validated on construction and again on every registry
//! mutation; see [`ExperimentDefinition::validate`].

mod experiment;
mod variant;

pub use experiment::{ExperimentDefinition, ExperimentDefinitionBuilder, ExperimentPatch};
pub use variant::{AllocationKind, RuleOperator, TargetingRule, TrafficAllocation, Variant};

/// Subject attributes consulted by targeting rules: free-form key/value
/// pairs supplied by the caller at decision time, opaque to the engine
/// beyond rule evaluation.
pub type Attributes = serde_json::Map<String, serde_json::Value>;
