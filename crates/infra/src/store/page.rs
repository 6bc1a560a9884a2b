//! Fixed-size pagination for the reporting listings.

use serde::{Deserialize, Serialize};

/// Rows per listing page.
pub const PAGE_SIZE: u32 = 6;

/// A 1-based page of `PAGE_SIZE` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    number: u32,
}

impl Page {
    /// Page numbers at or below zero are treated as the first page.
    pub fn new(number: i64) -> Self {
        let number = number.clamp(1, i64::from(u32::MAX)) as u32;
        Self { number }
    }

    pub fn first() -> Self {
        Self { number: 1 }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn limit(&self) -> u32 {
        PAGE_SIZE
    }

    /// `(number - 1) * PAGE_SIZE`, widened so large page numbers cannot overflow.
    pub fn offset(&self) -> u64 {
        u64::from(self.number - 1) * u64::from(PAGE_SIZE)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::first()
    }
}
