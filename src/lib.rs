//! # Bandera: Experimentation & Progressive Rollout Engine
//!
//! Bandera decides, for every subject and every experiment or feature
//! flag, which variant they see. Decisions are deterministic across
//! repeated calls and process restarts, support partial and staged
//! exposure, and raw exposure/conversion events roll up into a
//! statistically scored recommendation.
//!
//! ## Subsystems
//!
//! - [`assignment`]: pure `(subject, salt) -> bucket` hashing; the
//!   algorithm is a cross-language contract.
//! - [`definition`] / [`resolver`]: experiment schema and deterministic
//!   variant resolution over weighted variants and targeting rules.
//! - [`registry`]: validated lifecycle for definitions over a pluggable
//!   [`registry::DefinitionStore`].
//! - [`rollout`]: per-feature percentage rollouts with overrides, active
//!   windows, guarded mutations, and staged strategies.
//! - [`metrics`]: append-only exposure/conversion ingestion and on-demand
//!   two-proportion significance scoring against the control variant.
//! - [`engine`]: the facade gluing it all together with fail-open
//!   decision reads and best-effort event tracking.
//!
//! ## Example
//!
//! ```rust
//! use bandera::definition::{ExperimentDefinition, Variant};
//! use bandera::engine::Engine;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> bandera::Result<()> {
//! let engine = Engine::in_memory();
//! engine
//!     .create_experiment(
//!         ExperimentDefinition::builder("checkout_cta", "Checkout CTA")
//!             .variant(Variant::new("control", "Control", 50.0))
//!             .variant(Variant::new("bold", "Bold", 50.0))
//!             .default_variant("control")
//!             .active()
//!             .build()?,
//!     )
//!     .await?;
//!
//! let variant = engine.decide("checkout_cta", "user-42", None).await?;
//! engine
//!     .track_exposure("checkout_cta", &variant, Some("user-42"), None)
//!     .await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod assignment;
pub mod definition;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod resolver;
pub mod rollout;
pub mod sink;

pub use assignment::bucket;
pub use engine::Engine;
pub use error::{Error, Result};
