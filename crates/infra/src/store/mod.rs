//! Storage collaborator for the ledger workflows.
//!
//! `LedgerStore` is the read side (no locks) and the factory for `LedgerTx`,
//! the unit of work every multi-step workflow runs inside. Implementations:
//! - `InMemoryLedgerStore` for tests and single-process development;
//! - `PostgresLedgerStore` for production.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use creditshop_core::{CustomerId, DomainError, ItemId, PurchaseId, Serial};
use creditshop_customers::{ContractStatus, Customer, Payment, Witness};
use creditshop_products::{Product, Purchase};
use creditshop_sales::Item;

pub mod in_memory;
pub mod page;
pub mod postgres;

#[cfg(test)]
pub mod testing;

pub use in_memory::InMemoryLedgerStore;
pub use page::{PAGE_SIZE, Page};
pub use postgres::PostgresLedgerStore;

/// Storage operation error.
///
/// Infrastructure failures (`Retrieval`, `Persistence`, `Timeout`) are kept
/// apart from the row-level outcomes a workflow reacts to (`NotFound`,
/// `Conflict`, `InsufficientStock`).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("insufficient stock for {serial}: requested {requested}, available {available}")]
    InsufficientStock {
        serial: String,
        requested: i64,
        available: i64,
    },

    #[error("retrieval failed: {0}")]
    Retrieval(String),

    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("storage call timed out: {0}")]
    Timeout(String),
}

impl From<DomainError> for StoreError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound(msg) => StoreError::NotFound(msg),
            DomainError::Conflict(msg) => StoreError::Conflict(msg),
            DomainError::InsufficientStock {
                serial,
                requested,
                available,
            } => StoreError::InsufficientStock {
                serial,
                requested,
                available,
            },
            other => StoreError::Persistence(other.to_string()),
        }
    }
}

/// Bound a storage call by `limit`, reporting `operation` on expiry.
pub(crate) async fn with_timeout<T, F>(
    operation: &str,
    limit: Duration,
    fut: F,
) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(format!(
            "{operation} exceeded {}ms",
            limit.as_millis()
        ))),
    }
}

/// Read side of the ledger storage, plus the transaction factory.
///
/// Reads see committed data only and take no locks.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn fetch_customer(&self, customer_id: &CustomerId) -> Result<Option<Customer>, StoreError>;

    /// All credit-sale items of a customer (a.k.a. the customer's debt lines).
    async fn fetch_items_by_customer(&self, customer_id: &CustomerId) -> Result<Vec<Item>, StoreError>;

    async fn fetch_payments_by_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<Payment>, StoreError>;

    async fn fetch_product(&self, serial: &Serial) -> Result<Option<Product>, StoreError>;

    /// Ordered by `serial`.
    async fn fetch_products_page(&self, page: Page) -> Result<Vec<Product>, StoreError>;

    /// Ordered by `customer_id`.
    async fn fetch_customers_page(&self, page: Page) -> Result<Vec<Customer>, StoreError>;

    /// Ordered by `customer_id`.
    async fn fetch_payments_page(&self, page: Page) -> Result<Vec<Payment>, StoreError>;

    /// Ordered by `serial`.
    async fn fetch_purchases_page(&self, page: Page) -> Result<Vec<Purchase>, StoreError>;

    /// Every customer whose contract is still open, ordered by `customer_id`.
    async fn fetch_customers_on_contract(&self) -> Result<Vec<Customer>, StoreError>;

    async fn fetch_witness(&self, customer_id: &CustomerId) -> Result<Option<Witness>, StoreError>;

    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError>;
}

/// One unit of work. Nothing is visible to readers until `commit`.
///
/// Dropping a transaction without committing discards its writes.
#[async_trait]
pub trait LedgerTx: Send {
    /// Read a customer and hold its row lock until the transaction ends.
    async fn fetch_customer_for_update(
        &mut self,
        customer_id: &CustomerId,
    ) -> Result<Option<Customer>, StoreError>;

    async fn fetch_product_for_update(&mut self, serial: &Serial) -> Result<Option<Product>, StoreError>;

    async fn fetch_item(&mut self, item_id: &ItemId) -> Result<Option<Item>, StoreError>;

    async fn fetch_items_by_customer(&mut self, customer_id: &CustomerId) -> Result<Vec<Item>, StoreError>;

    async fn fetch_payments_by_customer(
        &mut self,
        customer_id: &CustomerId,
    ) -> Result<Vec<Payment>, StoreError>;

    async fn insert_customer(&mut self, customer: &Customer) -> Result<(), StoreError>;

    async fn update_customer(&mut self, customer: &Customer) -> Result<(), StoreError>;

    async fn update_contract_status(
        &mut self,
        customer_id: &CustomerId,
        status: ContractStatus,
    ) -> Result<(), StoreError>;

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError>;

    /// Overwrite a product's catalog fields. Unknown serial → `NotFound`.
    async fn update_product(&mut self, product: &Product) -> Result<(), StoreError>;

    /// `units := units - qty`. Returns the new count.
    ///
    /// Unknown serial → `NotFound`; a result below zero → `InsufficientStock`
    /// with the stored count left unchanged.
    async fn decrease_quantity(&mut self, serial: &Serial, qty: u32) -> Result<i64, StoreError>;

    /// `units := units + qty`. Returns the new count. Unknown serial → `NotFound`.
    async fn increase_quantity(&mut self, serial: &Serial, qty: u32) -> Result<i64, StoreError>;

    async fn insert_item(&mut self, item: &Item) -> Result<(), StoreError>;

    async fn update_item(&mut self, item: &Item) -> Result<(), StoreError>;

    async fn delete_item(&mut self, item_id: &ItemId) -> Result<(), StoreError>;

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), StoreError>;

    async fn insert_purchase(&mut self, purchase: &Purchase) -> Result<(), StoreError>;

    async fn delete_purchase(&mut self, purchase_id: &PurchaseId) -> Result<(), StoreError>;

    /// Read a customer's witness and hold its row lock until the transaction ends.
    async fn fetch_witness_for_update(
        &mut self,
        customer_id: &CustomerId,
    ) -> Result<Option<Witness>, StoreError>;

    /// Unknown customer → `NotFound`; a second witness for the customer → `Conflict`.
    async fn insert_witness(&mut self, witness: &Witness) -> Result<(), StoreError>;

    async fn update_witness(&mut self, witness: &Witness) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn fetch_customer(&self, customer_id: &CustomerId) -> Result<Option<Customer>, StoreError> {
        (**self).fetch_customer(customer_id).await
    }

    async fn fetch_items_by_customer(&self, customer_id: &CustomerId) -> Result<Vec<Item>, StoreError> {
        (**self).fetch_items_by_customer(customer_id).await
    }

    async fn fetch_payments_by_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<Payment>, StoreError> {
        (**self).fetch_payments_by_customer(customer_id).await
    }

    async fn fetch_product(&self, serial: &Serial) -> Result<Option<Product>, StoreError> {
        (**self).fetch_product(serial).await
    }

    async fn fetch_products_page(&self, page: Page) -> Result<Vec<Product>, StoreError> {
        (**self).fetch_products_page(page).await
    }

    async fn fetch_customers_page(&self, page: Page) -> Result<Vec<Customer>, StoreError> {
        (**self).fetch_customers_page(page).await
    }

    async fn fetch_payments_page(&self, page: Page) -> Result<Vec<Payment>, StoreError> {
        (**self).fetch_payments_page(page).await
    }

    async fn fetch_purchases_page(&self, page: Page) -> Result<Vec<Purchase>, StoreError> {
        (**self).fetch_purchases_page(page).await
    }

    async fn fetch_customers_on_contract(&self) -> Result<Vec<Customer>, StoreError> {
        (**self).fetch_customers_on_contract().await
    }

    async fn fetch_witness(&self, customer_id: &CustomerId) -> Result<Option<Witness>, StoreError> {
        (**self).fetch_witness(customer_id).await
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
        (**self).begin().await
    }
}
