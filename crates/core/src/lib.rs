//! `creditshop-core`: shared domain building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! the error model, business-key identifiers and the fixed-point `Money` type.

pub mod entity;
pub mod error;
pub mod id;
pub mod money;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{CustomerId, ItemId, PaymentId, PurchaseId, Serial, UserId};
pub use money::Money;
