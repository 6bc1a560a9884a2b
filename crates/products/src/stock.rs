//! Stock-level rules shared by every store implementation.

use serde::{Deserialize, Serialize};

use creditshop_core::{DomainError, DomainResult, Serial};

/// A signed change to a product's `units`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    delta: i64,
}

impl StockAdjustment {
    /// Take `qty` units out of stock (a sale or purchase).
    pub fn decrease(qty: u32) -> DomainResult<Self> {
        if qty == 0 {
            return Err(DomainError::validation("quantity must be greater than zero"));
        }
        Ok(Self {
            delta: -i64::from(qty),
        })
    }

    /// Put `qty` units back into stock (a restock).
    pub fn increase(qty: u32) -> DomainResult<Self> {
        if qty == 0 {
            return Err(DomainError::validation("quantity must be greater than zero"));
        }
        Ok(Self {
            delta: i64::from(qty),
        })
    }

    /// Units moved, regardless of direction.
    pub fn quantity(&self) -> i64 {
        self.delta.abs()
    }

    /// New unit count after applying this adjustment to `units`.
    ///
    /// A decrease that would leave fewer than zero units is rejected and the
    /// caller must leave the stored count untouched.
    pub fn apply_to(&self, serial: &Serial, units: i64) -> DomainResult<i64> {
        let next = units
            .checked_add(self.delta)
            .ok_or_else(|| DomainError::invariant("stock count overflow"))?;
        if next < 0 {
            return Err(DomainError::insufficient_stock(
                serial.as_str(),
                self.quantity(),
                units,
            ));
        }
        Ok(next)
    }
}
