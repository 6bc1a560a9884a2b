//! Credit sales domain module.
//!
//! One `Item` per installment sale, priced from a request-scoped catalog
//! snapshot. Pure domain logic: no IO, no HTTP, no storage.

pub mod catalog;
pub mod item;

pub use catalog::CatalogSnapshot;
pub use item::{CorrectItem, Item, OpenItem};
