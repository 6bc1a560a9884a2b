use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use creditshop_core::{DomainError, DomainResult, Money, Serial};
use creditshop_products::Product;

/// Unit prices as they were shown to the clerk when the sale form was built.
///
/// Passed explicitly with the request that uses it. Prices may be stale by the
/// time the sale is submitted; the sale is charged at the snapshot price.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    prices: BTreeMap<Serial, Money>,
}

impl CatalogSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_products<'a>(products: impl IntoIterator<Item = &'a Product>) -> Self {
        Self {
            prices: products
                .into_iter()
                .map(|p| (p.serial.clone(), p.price))
                .collect(),
        }
    }

    pub fn with_price(mut self, serial: Serial, price: Money) -> Self {
        self.prices.insert(serial, price);
        self
    }

    pub fn insert(&mut self, serial: Serial, price: Money) {
        self.prices.insert(serial, price);
    }

    pub fn price_of(&self, serial: &Serial) -> DomainResult<Money> {
        self.prices
            .get(serial)
            .copied()
            .ok_or_else(|| DomainError::not_found(format!("serial {serial} is not in the catalog")))
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}
