use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, instrument};

use creditshop_customers::{Customer, Payment};
use creditshop_products::{Product, Purchase};

use super::WorkflowError;
use crate::store::{LedgerStore, Page};

/// Which report a page is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListingKind {
    Products,
    Customers,
    Payments,
    Purchases,
}

impl ListingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingKind::Products => "products",
            ListingKind::Customers => "customers",
            ListingKind::Payments => "payments",
            ListingKind::Purchases => "purchases",
        }
    }
}

impl fmt::Display for ListingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListingKind {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "products" => Ok(ListingKind::Products),
            "customers" => Ok(ListingKind::Customers),
            "payments" => Ok(ListingKind::Payments),
            "purchases" => Ok(ListingKind::Purchases),
            other => Err(WorkflowError::validation(format!("unknown listing: {other}"))),
        }
    }
}

/// One page of rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Listing {
    Products(Vec<Product>),
    Customers(Vec<Customer>),
    Payments(Vec<Payment>),
    Purchases(Vec<Purchase>),
}

impl Listing {
    pub fn kind(&self) -> ListingKind {
        match self {
            Listing::Products(_) => ListingKind::Products,
            Listing::Customers(_) => ListingKind::Customers,
            Listing::Payments(_) => ListingKind::Payments,
            Listing::Purchases(_) => ListingKind::Purchases,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Listing::Products(rows) => rows.len(),
            Listing::Customers(rows) => rows.len(),
            Listing::Payments(rows) => rows.len(),
            Listing::Purchases(rows) => rows.len(),
        }
    }

    /// Past the last page. Not an error.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fixed-size, key-ordered report pages.
#[derive(Debug, Clone)]
pub struct ListingRepository<S> {
    store: S,
}

impl<S: LedgerStore> ListingRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Page `page_number` (1-based; anything below 1 reads as 1).
    #[instrument(skip(self), err)]
    pub async fn fetch_page(&self, kind: ListingKind, page_number: i64) -> Result<Listing, WorkflowError> {
        let page = Page::new(page_number);
        let listing = match kind {
            ListingKind::Products => Listing::Products(self.store.fetch_products_page(page).await?),
            ListingKind::Customers => Listing::Customers(self.store.fetch_customers_page(page).await?),
            ListingKind::Payments => Listing::Payments(self.store.fetch_payments_page(page).await?),
            ListingKind::Purchases => Listing::Purchases(self.store.fetch_purchases_page(page).await?),
        };
        debug!(page = page.number(), rows = listing.len(), "listing page fetched");
        Ok(listing)
    }
}
