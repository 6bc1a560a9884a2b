//! Fault-injecting store wrapper for workflow tests.
//!
//! Counts every storage call by operation name and fails the operations it
//! was told to fail, without reaching the wrapped store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use creditshop_core::{CustomerId, ItemId, PurchaseId, Serial};
use creditshop_customers::{ContractStatus, Customer, Payment, Witness};
use creditshop_products::{Product, Purchase};
use creditshop_sales::Item;

use super::{LedgerStore, LedgerTx, Page, StoreError};

#[derive(Debug, Clone, Default)]
struct FaultPlan {
    failures: Arc<Mutex<HashMap<&'static str, StoreError>>>,
    calls: Arc<Mutex<HashMap<&'static str, usize>>>,
}

impl FaultPlan {
    fn enter(&self, op: &'static str) -> Result<(), StoreError> {
        *self.calls.lock().unwrap().entry(op).or_default() += 1;
        match self.failures.lock().unwrap().get(op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FaultyStore<S> {
    inner: S,
    plan: FaultPlan,
}

impl<S> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            plan: FaultPlan::default(),
        }
    }

    /// Make every later call to `op` fail with `err`.
    pub fn fail_on(&self, op: &'static str, err: StoreError) {
        self.plan.failures.lock().unwrap().insert(op, err);
    }

    /// Let calls to `op` through again.
    pub fn heal(&self, op: &'static str) {
        self.plan.failures.lock().unwrap().remove(op);
    }

    /// Number of calls to `op` so far, failed ones included.
    pub fn calls(&self, op: &str) -> usize {
        self.plan.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: LedgerStore> LedgerStore for FaultyStore<S> {
    async fn fetch_customer(&self, customer_id: &CustomerId) -> Result<Option<Customer>, StoreError> {
        self.plan.enter("fetch_customer")?;
        self.inner.fetch_customer(customer_id).await
    }

    async fn fetch_items_by_customer(&self, customer_id: &CustomerId) -> Result<Vec<Item>, StoreError> {
        self.plan.enter("fetch_items_by_customer")?;
        self.inner.fetch_items_by_customer(customer_id).await
    }

    async fn fetch_payments_by_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<Payment>, StoreError> {
        self.plan.enter("fetch_payments_by_customer")?;
        self.inner.fetch_payments_by_customer(customer_id).await
    }

    async fn fetch_product(&self, serial: &Serial) -> Result<Option<Product>, StoreError> {
        self.plan.enter("fetch_product")?;
        self.inner.fetch_product(serial).await
    }

    async fn fetch_products_page(&self, page: Page) -> Result<Vec<Product>, StoreError> {
        self.plan.enter("fetch_products_page")?;
        self.inner.fetch_products_page(page).await
    }

    async fn fetch_customers_page(&self, page: Page) -> Result<Vec<Customer>, StoreError> {
        self.plan.enter("fetch_customers_page")?;
        self.inner.fetch_customers_page(page).await
    }

    async fn fetch_payments_page(&self, page: Page) -> Result<Vec<Payment>, StoreError> {
        self.plan.enter("fetch_payments_page")?;
        self.inner.fetch_payments_page(page).await
    }

    async fn fetch_purchases_page(&self, page: Page) -> Result<Vec<Purchase>, StoreError> {
        self.plan.enter("fetch_purchases_page")?;
        self.inner.fetch_purchases_page(page).await
    }

    async fn fetch_customers_on_contract(&self) -> Result<Vec<Customer>, StoreError> {
        self.plan.enter("fetch_customers_on_contract")?;
        self.inner.fetch_customers_on_contract().await
    }

    async fn fetch_witness(&self, customer_id: &CustomerId) -> Result<Option<Witness>, StoreError> {
        self.plan.enter("fetch_witness")?;
        self.inner.fetch_witness(customer_id).await
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
        self.plan.enter("begin")?;
        let inner = self.inner.begin().await?;
        Ok(Box::new(FaultyTx {
            inner,
            plan: self.plan.clone(),
        }))
    }
}

struct FaultyTx {
    inner: Box<dyn LedgerTx>,
    plan: FaultPlan,
}

#[async_trait]
impl LedgerTx for FaultyTx {
    async fn fetch_customer_for_update(
        &mut self,
        customer_id: &CustomerId,
    ) -> Result<Option<Customer>, StoreError> {
        self.plan.enter("fetch_customer_for_update")?;
        self.inner.fetch_customer_for_update(customer_id).await
    }

    async fn fetch_product_for_update(&mut self, serial: &Serial) -> Result<Option<Product>, StoreError> {
        self.plan.enter("fetch_product_for_update")?;
        self.inner.fetch_product_for_update(serial).await
    }

    async fn fetch_item(&mut self, item_id: &ItemId) -> Result<Option<Item>, StoreError> {
        self.plan.enter("fetch_item")?;
        self.inner.fetch_item(item_id).await
    }

    async fn fetch_items_by_customer(&mut self, customer_id: &CustomerId) -> Result<Vec<Item>, StoreError> {
        self.plan.enter("tx_fetch_items_by_customer")?;
        self.inner.fetch_items_by_customer(customer_id).await
    }

    async fn fetch_payments_by_customer(
        &mut self,
        customer_id: &CustomerId,
    ) -> Result<Vec<Payment>, StoreError> {
        self.plan.enter("tx_fetch_payments_by_customer")?;
        self.inner.fetch_payments_by_customer(customer_id).await
    }

    async fn insert_customer(&mut self, customer: &Customer) -> Result<(), StoreError> {
        self.plan.enter("insert_customer")?;
        self.inner.insert_customer(customer).await
    }

    async fn update_customer(&mut self, customer: &Customer) -> Result<(), StoreError> {
        self.plan.enter("update_customer")?;
        self.inner.update_customer(customer).await
    }

    async fn update_contract_status(
        &mut self,
        customer_id: &CustomerId,
        status: ContractStatus,
    ) -> Result<(), StoreError> {
        self.plan.enter("update_contract_status")?;
        self.inner.update_contract_status(customer_id, status).await
    }

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        self.plan.enter("insert_product")?;
        self.inner.insert_product(product).await
    }

    async fn update_product(&mut self, product: &Product) -> Result<(), StoreError> {
        self.plan.enter("update_product")?;
        self.inner.update_product(product).await
    }

    async fn decrease_quantity(&mut self, serial: &Serial, qty: u32) -> Result<i64, StoreError> {
        self.plan.enter("decrease_quantity")?;
        self.inner.decrease_quantity(serial, qty).await
    }

    async fn increase_quantity(&mut self, serial: &Serial, qty: u32) -> Result<i64, StoreError> {
        self.plan.enter("increase_quantity")?;
        self.inner.increase_quantity(serial, qty).await
    }

    async fn insert_item(&mut self, item: &Item) -> Result<(), StoreError> {
        self.plan.enter("insert_item")?;
        self.inner.insert_item(item).await
    }

    async fn update_item(&mut self, item: &Item) -> Result<(), StoreError> {
        self.plan.enter("update_item")?;
        self.inner.update_item(item).await
    }

    async fn delete_item(&mut self, item_id: &ItemId) -> Result<(), StoreError> {
        self.plan.enter("delete_item")?;
        self.inner.delete_item(item_id).await
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), StoreError> {
        self.plan.enter("insert_payment")?;
        self.inner.insert_payment(payment).await
    }

    async fn insert_purchase(&mut self, purchase: &Purchase) -> Result<(), StoreError> {
        self.plan.enter("insert_purchase")?;
        self.inner.insert_purchase(purchase).await
    }

    async fn delete_purchase(&mut self, purchase_id: &PurchaseId) -> Result<(), StoreError> {
        self.plan.enter("delete_purchase")?;
        self.inner.delete_purchase(purchase_id).await
    }

    async fn fetch_witness_for_update(
        &mut self,
        customer_id: &CustomerId,
    ) -> Result<Option<Witness>, StoreError> {
        self.plan.enter("fetch_witness_for_update")?;
        self.inner.fetch_witness_for_update(customer_id).await
    }

    async fn insert_witness(&mut self, witness: &Witness) -> Result<(), StoreError> {
        self.plan.enter("insert_witness")?;
        self.inner.insert_witness(witness).await
    }

    async fn update_witness(&mut self, witness: &Witness) -> Result<(), StoreError> {
        self.plan.enter("update_witness")?;
        self.inner.update_witness(witness).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.plan.enter("commit")?;
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.plan.enter("rollback")?;
        self.inner.rollback().await
    }
}
