//! Products domain module.
//!
//! Catalog entries, stock-level rules and direct (non-credit) purchases.
//! Pure domain logic: no IO, no HTTP, no storage.

pub mod product;
pub mod purchase;
pub mod stock;

pub use product::{Product, RegisterProduct, UpdateProduct};
pub use purchase::{Purchase, RecordPurchase};
pub use stock::StockAdjustment;
