//! Customer ledger.
//!
//! The outstanding balance is never stored: it is always derived from the
//! customer's credit-sale items and payments.

pub mod statement;

pub use statement::{LedgerStatement, installment, outstanding_balance};
