//! Domain error model.

use thiserror::Error;

use crate::id::TenantId;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, tenant scoping, state machine violations). Data-quality
/// findings on sales and lots are *not* errors; they are collected as
/// validation findings by the costing crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A record is tagged with a tenant other than the one in scope.
    #[error("tenant mismatch: expected {expected}, found {found}")]
    TenantMismatch { expected: TenantId, found: TenantId },

    /// A tenant-scoped operation was attempted with no tenant in scope.
    #[error("no tenant in scope")]
    MissingTenant,

    /// A requested resource was not found (domain-level).
    #[error("not found: {0}")]
    NotFound(String),

    /// A conflict occurred (e.g. another run already in flight).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A state machine transition is not allowed from the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn tenant_mismatch(expected: TenantId, found: TenantId) -> Self {
        Self::TenantMismatch { expected, found }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }
}
