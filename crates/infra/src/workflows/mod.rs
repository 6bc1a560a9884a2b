//! Ledger workflows.
//!
//! Each workflow is constructed with its storage dependency and runs one
//! request's worth of work. Multi-step writes run inside a single `LedgerTx`:
//! they either commit together or are rolled back together.
//!
//! - `LedgerCalculator`: outstanding balance, debt summary, customers owing today
//! - `InventoryAdjuster`: stock decrease / increase / restock
//! - `ItemIntake`: credit sale (item insert + stock decrease, compensated on failure)
//! - `PaymentProcessor`: payment + installment count + contract closing
//! - `ListingRepository`: fixed-size report pages
//! - `PurchaseRecorder`: direct sale (purchase insert + stock decrease, compensated)
//! - `Registry`: product / customer registration and edits, witnesses, item corrections

use thiserror::Error;
use tracing::warn;

use creditshop_core::DomainError;

use crate::store::{LedgerTx, StoreError};

pub mod inventory;
pub mod item_intake;
pub mod ledger;
pub mod listings;
pub mod payments;
pub mod purchases;
pub mod registry;

#[cfg(test)]
mod fixtures;

pub use inventory::InventoryAdjuster;
pub use item_intake::{ItemIntake, PostItem, PostedItem};
pub use ledger::{DebtSummary, LedgerCalculator, OwingCustomer};
pub use listings::{Listing, ListingKind, ListingRepository};
pub use payments::{PaymentProcessor, PaymentReceipt, RecordPaymentRequest};
pub use purchases::{PurchaseRecorder, RecordPurchaseRequest, RecordedPurchase};
pub use registry::{
    CorrectItemRequest, NewCustomer, NewProduct, ProductEdit, ProfileEdit, Registry, WitnessForm,
};

/// Workflow failure, in the taxonomy callers present to users.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(String),

    /// A domain invariant would be broken by the request.
    #[error("{0}")]
    InvariantViolation(String),

    /// No matching customer, product, serial or item.
    #[error("{0}")]
    NotFound(String),

    /// The business key already exists.
    #[error("{0}")]
    Conflict(String),

    #[error("insufficient stock for {serial}: requested {requested}, available {available}")]
    InsufficientStock {
        serial: String,
        requested: i64,
        available: i64,
    },

    /// A read failed.
    #[error("retrieval failed: {0}")]
    Retrieval(String),

    /// A write failed.
    #[error("persistence failed: {0}")]
    Persistence(String),

    /// A storage call exceeded its time budget.
    #[error("timed out: {0}")]
    Timeout(String),
}

impl WorkflowError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}

impl From<DomainError> for WorkflowError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => WorkflowError::Validation(msg),
            DomainError::InvariantViolation(msg) => WorkflowError::InvariantViolation(msg),
            DomainError::NotFound(msg) => WorkflowError::NotFound(msg),
            DomainError::Conflict(msg) => WorkflowError::Conflict(msg),
            DomainError::InsufficientStock {
                serial,
                requested,
                available,
            } => WorkflowError::InsufficientStock {
                serial,
                requested,
                available,
            },
        }
    }
}

impl From<StoreError> for WorkflowError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(msg) => WorkflowError::NotFound(msg),
            StoreError::Conflict(msg) => WorkflowError::Conflict(msg),
            StoreError::InsufficientStock {
                serial,
                requested,
                available,
            } => WorkflowError::InsufficientStock {
                serial,
                requested,
                available,
            },
            StoreError::Retrieval(msg) => WorkflowError::Retrieval(msg),
            StoreError::Persistence(msg) => WorkflowError::Persistence(msg),
            StoreError::Timeout(msg) => WorkflowError::Timeout(msg),
        }
    }
}

/// Map a failed write: row-level outcomes and timeouts keep their type, any
/// other storage failure is a persistence failure.
pub(crate) fn write_failure(err: StoreError) -> WorkflowError {
    match err {
        StoreError::Retrieval(msg) | StoreError::Persistence(msg) => WorkflowError::Persistence(msg),
        other => other.into(),
    }
}

/// Roll back `tx` and hand back `err`. A failed rollback is logged only.
pub(crate) async fn abort(tx: Box<dyn LedgerTx>, err: WorkflowError) -> WorkflowError {
    if let Err(rollback_err) = tx.rollback().await {
        warn!(error = %rollback_err, cause = %err, "rollback failed");
    }
    err
}

/// Commit `tx` if `result` is `Ok`, roll it back otherwise.
pub(crate) async fn finish<T>(
    tx: Box<dyn LedgerTx>,
    result: Result<T, WorkflowError>,
) -> Result<T, WorkflowError> {
    match result {
        Ok(value) => {
            tx.commit().await.map_err(write_failure)?;
            Ok(value)
        }
        Err(err) => Err(abort(tx, err).await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_failures_on_writes_surface_as_persistence() {
        assert_eq!(
            write_failure(StoreError::Retrieval("boom".to_string())),
            WorkflowError::Persistence("boom".to_string())
        );
        assert_eq!(
            write_failure(StoreError::Timeout("slow".to_string())),
            WorkflowError::Timeout("slow".to_string())
        );
        assert!(matches!(
            write_failure(StoreError::InsufficientStock {
                serial: "P1".to_string(),
                requested: 5,
                available: 3,
            }),
            WorkflowError::InsufficientStock { .. }
        ));
    }

    #[test]
    fn domain_errors_keep_their_kind() {
        assert_eq!(
            WorkflowError::from(DomainError::validation("month is required")),
            WorkflowError::Validation("month is required".to_string())
        );
        assert!(matches!(
            WorkflowError::from(DomainError::not_found("x")),
            WorkflowError::NotFound(_)
        ));
    }
}
