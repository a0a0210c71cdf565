//! Variant, traffic allocation, and targeting rule types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Attributes;

/// One named branch of an experiment a subject can be assigned to.
///
/// The payload is opaque to the engine and interpreted by the caller
/// (copy text, layout knobs, model ids — anything JSON).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Variant {
    key: String,
    name: String,
    #[serde(default)]
    weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
}

impl Variant {
    /// Create a variant with an explicit traffic weight in `[0, 100]`.
    #[must_use]
    pub fn new(key: impl Into<String>, name: impl Into<String>, weight: f64) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            weight,
            payload: None,
        }
    }

    /// Create an unweighted variant; unweighted sets split traffic evenly.
    #[must_use]
    pub fn unweighted(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(key, name, 0.0)
    }

    /// Attach an opaque payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Variant key, unique within its experiment.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Human-readable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Traffic weight in `[0, 100]`; `0.0` means unweighted.
    #[must_use]
    pub const fn weight(&self) -> f64 {
        self.weight
    }

    /// Opaque caller payload, if any.
    #[must_use]
    pub const fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }
}

/// How traffic is allocated to variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AllocationKind {
    /// Deterministic bucketing keyed on subject id (the default).
    #[default]
    Sticky,
    /// Fresh assignment per call; still deterministic per `(subject, key)`
    /// in this engine, kept for schema compatibility.
    Random,
    /// Allocation driven by subject attributes via targeting rules.
    AttributeBased,
}

/// Traffic allocation settings for an experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TrafficAllocation {
    #[serde(rename = "type")]
    kind: AllocationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    seed: Option<String>,
}

impl TrafficAllocation {
    /// Create an allocation of the given kind.
    #[must_use]
    pub const fn new(kind: AllocationKind) -> Self {
        Self { kind, seed: None }
    }

    /// Override the bucketing salt with an explicit seed.
    #[must_use]
    pub fn with_seed(mut self, seed: impl Into<String>) -> Self {
        self.seed = Some(seed.into());
        self
    }

    /// Allocation kind.
    #[must_use]
    pub const fn kind(&self) -> AllocationKind {
        self.kind
    }

    /// Explicit bucketing seed, if set; falls back to the experiment key.
    #[must_use]
    pub fn seed(&self) -> Option<&str> {
        self.seed.as_deref()
    }
}

/// Comparison operator for a targeting rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOperator {
    /// Attribute equals the rule value exactly.
    Equals,
    /// String attribute contains the rule value as a substring, or array
    /// attribute contains the rule value as an element.
    Contains,
    /// Numeric attribute strictly greater than the rule value.
    GreaterThan,
    /// Numeric attribute strictly less than the rule value.
    LessThan,
    /// Attribute is an element of the rule's array value.
    In,
    /// Attribute is not an element of the rule's array value.
    NotIn,
}

/// A single eligibility predicate over subject attributes.
///
/// Rules combine with AND semantics: a subject must pass every rule on
/// the definition to be eligible for bucketing. A missing attribute or a
/// type mismatch fails the rule (fail closed).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TargetingRule {
    attribute: String,
    operator: RuleOperator,
    value: Value,
}

impl TargetingRule {
    /// Create a rule comparing `attribute` against `value`.
    #[must_use]
    pub fn new(attribute: impl Into<String>, operator: RuleOperator, value: Value) -> Self {
        Self {
            attribute: attribute.into(),
            operator,
            value,
        }
    }

    /// Attribute name the rule inspects.
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Comparison operator.
    #[must_use]
    pub const fn operator(&self) -> RuleOperator {
        self.operator
    }

    /// Rule value compared against the subject attribute.
    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.value
    }

    /// Evaluate the rule against a subject's attributes.
    #[must_use]
    pub fn matches(&self, attributes: &Attributes) -> bool {
        let Some(attr) = attributes.get(&self.attribute) else {
            return false;
        };
        match self.operator {
            RuleOperator::Equals => attr == &self.value,
            RuleOperator::Contains => match (attr, &self.value) {
                (Value::String(haystack), Value::String(needle)) => haystack.contains(needle),
                (Value::Array(items), needle) => items.contains(needle),
                _ => false,
            },
            RuleOperator::GreaterThan => match (attr.as_f64(), self.value.as_f64()) {
                (Some(a), Some(v)) => a > v,
                _ => false,
            },
            RuleOperator::LessThan => match (attr.as_f64(), self.value.as_f64()) {
                (Some(a), Some(v)) => a < v,
                _ => false,
            },
            RuleOperator::In => self
                .value
                .as_array()
                .is_some_and(|candidates| candidates.contains(attr)),
            RuleOperator::NotIn => self
                .value
                .as_array()
                .is_some_and(|candidates| !candidates.contains(attr)),
        }
    }
}
