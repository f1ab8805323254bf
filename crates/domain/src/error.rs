//! Common error types used across the workspace.
//!
//! [`AxlinkError`] is the error every port and use-case returns. Each layer
//! defines its own typed errors and converts into it via `From`.
//!
//! The two connection-related variants carry the host contract:
//! [`AxlinkError::NotReady`] means "retry later with backoff",
//! [`AxlinkError::AuthRequired`] means "stop retrying until the user acts".

use crate::migration::MigrationError;

/// Top-level error for axlink operations.
#[derive(Debug, thiserror::Error)]
pub enum AxlinkError {
    /// The device could not be reached. Transient; the host reschedules setup.
    #[error("device not ready: {reason}")]
    NotReady { reason: String },

    /// The device rejected the stored credentials. Terminal until the user
    /// updates them.
    #[error("authentication required: {reason}")]
    AuthRequired { reason: String },

    /// The stored entry cannot be brought to (or used at) the current schema.
    #[error("migration error")]
    Migration(#[from] MigrationError),

    /// A domain invariant was violated.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// A referenced record does not exist.
    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// A persistence collaborator failed.
    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The device session failed outside of connection establishment.
    #[error("session error")]
    Session(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl AxlinkError {
    /// Returns `true` when retrying later may succeed without user action.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotReady { .. })
    }

    /// Returns `true` when the user must update credentials before retrying.
    #[must_use]
    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::AuthRequired { .. })
    }
}

/// Domain invariant violations.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// A name field was empty.
    #[error("name must not be empty")]
    EmptyName,

    /// A device unique id was empty.
    #[error("unique id must not be empty")]
    EmptyUniqueId,

    /// The entry host was empty.
    #[error("host must not be empty")]
    EmptyHost,

    /// The entry payload does not match the current schema.
    #[error("invalid entry payload")]
    InvalidPayload(#[source] serde_json::Error),
}

/// A record lookup that found nothing.
#[derive(Debug, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    /// Kind of record (e.g. `"Entry"`).
    pub entity: &'static str,
    /// Identifier that was looked up.
    pub id: String,
}

/// A wire string that does not name any variant of a closed enumeration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value {value:?}")]
pub struct UnknownVariantError {
    /// Name of the enumeration.
    pub kind: &'static str,
    /// The rejected string.
    pub value: String,
}
