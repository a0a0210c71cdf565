//! Error types for bandera
//!
//! Decision reads are designed to fail open (see [`crate::engine`]); the
//! variants here are the loud failures surfaced by administrative and
//! aggregation paths.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Bandera error types
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input to a create/update operation. No partial state is
    /// committed when this is returned.
    #[error("validation failed: {0}")]
    Validation(String),

    /// An experiment, feature, or rollout key does not exist (or is
    /// soft-deleted).
    #[error("not found: {0}")]
    NotFound(String),

    /// A definition store, event store, or event sink collaborator was
    /// unreachable. Best-effort write paths swallow this class; decision
    /// reads fall back to the default variant / excluded.
    #[error("collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for [`Error::Validation`] with an owned message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Shorthand for [`Error::NotFound`] naming the missing key.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }
}
