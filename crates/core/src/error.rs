//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Storage failures belong to the infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Missing or malformed input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// No matching customer, product or serial.
    #[error("not found: {0}")]
    NotFound(String),

    /// A business key already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A stock decrease would drive `units` below zero.
    #[error("insufficient stock for {serial}: requested {requested}, available {available}")]
    InsufficientStock {
        serial: String,
        requested: i64,
        available: i64,
    },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn insufficient_stock(serial: impl Into<String>, requested: i64, available: i64) -> Self {
        Self::InsufficientStock {
            serial: serial.into(),
            requested,
            available,
        }
    }
}
